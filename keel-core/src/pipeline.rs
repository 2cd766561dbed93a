//! Pipeline-level validation
//!
//! A stage can only check itself. Once every stage of a project is known,
//! [`Pipeline::new`] checks what needs the whole graph:
//! - stage ids are unique
//! - every upstream id resolves to a known stage
//! - dependencies form no cycle
//!
//! The dependency order computed here is for display and export only; the
//! pipeline engine does its own scheduling.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::domain::stage::StageDescriptor;
use crate::error::PipelineError;

/// A validated set of stages
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    stages: Vec<StageDescriptor>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    order: Vec<usize>,
}

impl Pipeline {
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut index = HashMap::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.id().to_string(), i).is_some() {
                return Err(PipelineError::DuplicateStage {
                    id: stage.id().to_string(),
                });
            }
        }

        for stage in &stages {
            for dep in stage.dependencies() {
                if !index.contains_key(&dep.upstream_id) {
                    return Err(PipelineError::UnknownUpstream {
                        stage: stage.id().to_string(),
                        upstream: dep.upstream_id.clone(),
                    });
                }
            }
        }

        let order = dependency_order(&stages, &index)?;
        debug!(stages = stages.len(), "Validated pipeline");

        Ok(Self {
            stages,
            index,
            order,
        })
    }

    /// Stages in definition order
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn stage(&self, id: &str) -> Option<&StageDescriptor> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages ordered so that every stage follows its upstream stages
    ///
    /// Ties are broken by definition order, so the result is stable.
    pub fn dependency_order(&self) -> Vec<&StageDescriptor> {
        self.order.iter().map(|&i| &self.stages[i]).collect()
    }

    /// Stages that directly depend on `id`
    pub fn downstream_of(&self, id: &str) -> Vec<&StageDescriptor> {
        self.stages
            .iter()
            .filter(|s| s.dependency(id).is_some())
            .collect()
    }
}

/// Kahn's algorithm over upstream -> downstream edges
fn dependency_order(
    stages: &[StageDescriptor],
    index: &HashMap<String, usize>,
) -> Result<Vec<usize>, PipelineError> {
    let mut in_degree = vec![0usize; stages.len()];
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];

    for (i, stage) in stages.iter().enumerate() {
        for dep in stage.dependencies() {
            let upstream = index[&dep.upstream_id];
            downstream[upstream].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &child in &downstream[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() < stages.len() {
        let stuck = (0..stages.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| stages[i].id().to_string())
            .collect();
        return Err(PipelineError::Cycle { stages: stuck });
    }

    Ok(order)
}
