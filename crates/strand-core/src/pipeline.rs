//! Assembling observer chains from declarative stage lists.
//!
//! A stage names an operator and, when the operator needs one, a callback
//! registered in a [`Registry`]. This lets a chain be described in a
//! configuration file and resolved against callbacks compiled into the
//! program:
//!
//! ```toml
//! [[stages]]
//! op = "filter"
//! callback = "truthy"
//!
//! [[stages]]
//! op = "for_each"
//! callback = "print"
//! ```
//!
//! Every stage is resolved before any is applied, so a stage list with an
//! unresolvable callback leaves the root observer untouched.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ObserverError;
use crate::observer::Observer;

/// A named predicate, used by `filter` and `until` stages.
pub type Predicate<E> = Rc<dyn Fn(&E, usize) -> bool>;

/// A named mapper, used by `map` stages. Pipelines are homogeneous, so a
/// mapper returns the same event type it receives.
pub type Mapper<E> = Rc<dyn Fn(&E, usize) -> E>;

/// A named terminal callback, used by `for_each` stages.
pub type Sink<E> = Rc<dyn Fn(&E, usize)>;

/// Operator applied by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOp {
    ForEach,
    Filter,
    Map,
    Until,
    Start,
    Stop,
}

impl StageOp {
    /// Operation name as reported in errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForEach => "forEach",
            Self::Filter => "filter",
            Self::Map => "map",
            Self::Until => "until",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for StageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub op: StageOp,
    /// Registry name of the callback. Ignored by `start` and `stop`.
    #[serde(default)]
    pub callback: Option<String>,
}

impl StageSpec {
    pub fn new(op: StageOp, callback: impl Into<String>) -> Self {
        Self {
            op,
            callback: Some(callback.into()),
        }
    }

    pub fn bare(op: StageOp) -> Self {
        Self { op, callback: None }
    }
}

/// Named callbacks available to pipeline stages.
pub struct Registry<E> {
    predicates: HashMap<String, Predicate<E>>,
    mappers: HashMap<String, Mapper<E>>,
    sinks: HashMap<String, Sink<E>>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            predicates: HashMap::new(),
            mappers: HashMap::new(),
            sinks: HashMap::new(),
        }
    }
}

impl<E> fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut predicates: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        let mut mappers: Vec<&str> = self.mappers.keys().map(String::as_str).collect();
        let mut sinks: Vec<&str> = self.sinks.keys().map(String::as_str).collect();
        predicates.sort_unstable();
        mappers.sort_unstable();
        sinks.sort_unstable();
        f.debug_struct("Registry")
            .field("predicates", &predicates)
            .field("mappers", &mappers)
            .field("sinks", &sinks)
            .finish()
    }
}

impl<E> Registry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&E, usize) -> bool + 'static,
    ) -> Self {
        self.predicates.insert(name.into(), Rc::new(predicate));
        self
    }

    pub fn with_mapper(
        mut self,
        name: impl Into<String>,
        mapper: impl Fn(&E, usize) -> E + 'static,
    ) -> Self {
        self.mappers.insert(name.into(), Rc::new(mapper));
        self
    }

    pub fn with_sink(mut self, name: impl Into<String>, sink: impl Fn(&E, usize) + 'static) -> Self {
        self.sinks.insert(name.into(), Rc::new(sink));
        self
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate<E>> {
        self.predicates.get(name)
    }

    pub fn mapper(&self, name: &str) -> Option<&Mapper<E>> {
        self.mappers.get(name)
    }

    pub fn sink(&self, name: &str) -> Option<&Sink<E>> {
        self.sinks.get(name)
    }
}

/// A stage with its callback looked up.
enum Resolved<E> {
    ForEach(Sink<E>),
    Filter(Predicate<E>),
    Map(Mapper<E>),
    Until(Predicate<E>),
    Start,
    Stop,
}

fn lookup<T: Clone>(
    table: &HashMap<String, T>,
    stage: &StageSpec,
) -> Result<T, ObserverError> {
    stage
        .callback
        .as_deref()
        .and_then(|name| table.get(name))
        .cloned()
        .ok_or(ObserverError::InvalidCallback {
            operation: stage.op.as_str(),
        })
}

fn resolve<E>(stage: &StageSpec, registry: &Registry<E>) -> Result<Resolved<E>, ObserverError> {
    Ok(match stage.op {
        StageOp::ForEach => Resolved::ForEach(lookup(&registry.sinks, stage)?),
        StageOp::Filter => Resolved::Filter(lookup(&registry.predicates, stage)?),
        StageOp::Map => Resolved::Map(lookup(&registry.mappers, stage)?),
        StageOp::Until => Resolved::Until(lookup(&registry.predicates, stage)?),
        StageOp::Start => Resolved::Start,
        StageOp::Stop => Resolved::Stop,
    })
}

/// Applies `stages` to `root` from left to right and returns the tail of the
/// resulting chain.
///
/// # Errors
///
/// Returns [`ObserverError::InvalidCallback`] naming the operation of the
/// first stage whose callback is missing or not registered. No stage is
/// applied in that case.
pub fn assemble<E: 'static>(
    root: &Observer<E>,
    stages: &[StageSpec],
    registry: &Registry<E>,
) -> Result<Observer<E>, ObserverError> {
    let plan = stages
        .iter()
        .map(|stage| resolve(stage, registry))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tail = root.clone();
    for (position, (stage, resolved)) in stages.iter().zip(plan).enumerate() {
        tail = match resolved {
            Resolved::ForEach(sink) => tail.for_each(move |event, index| sink(event, index)),
            Resolved::Filter(predicate) => {
                tail.filter(move |event, index| predicate(event, index))
            }
            Resolved::Map(mapper) => tail.map(move |event, index| mapper(event, index)),
            Resolved::Until(predicate) => tail.until(move |event, index| predicate(event, index)),
            Resolved::Start => tail.start(),
            Resolved::Stop => tail.stop(),
        };
        tracing::debug!(
            position,
            op = %stage.op,
            callback = stage.callback.as_deref().unwrap_or("-"),
            "pipeline stage applied"
        );
    }

    Ok(tail)
}
