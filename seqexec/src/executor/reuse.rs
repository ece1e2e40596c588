//! Cluster-based buffer reuse.
//!
//! A reuse table maps output variable names onto cluster names. Each cluster
//! keeps one representative variable whose buffer is the largest seen so far
//! for that cluster; whenever an operator output outgrows it, that output
//! becomes the representative and every member of the cluster is re-pointed
//! at its buffer. Cluster buffers never shrink.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::operator::Operator;
use crate::scope::{Scope, Variable};

use super::trace::ClusterGrowth;

/// Original variable name to cluster name.
pub type ReuseTable = HashMap<String, String>;

/// Parse a reuse table from a JSON object of string values.
pub fn reuse_table_from_json(value: Value) -> Result<ReuseTable> {
    let table: ReuseTable = serde_json::from_value(value)
        .map_err(|err| anyhow!("reuse table must map names to cluster names: {}", err))?;
    Ok(table)
}

#[derive(Debug, Clone)]
struct ReuseEntry {
    name: String,
    var: Variable,
    cluster: usize,
}

#[derive(Debug, Default)]
pub struct ReusePlan {
    cluster_names: Vec<String>,
    cluster_buffers: Vec<Option<Variable>>,
    cluster_sizes: Vec<usize>,
    cache: BTreeMap<usize, Vec<ReuseEntry>>,
}

impl ReusePlan {
    /// Build the plan over `ops`. Table entries whose variable or cluster
    /// variable is missing from `scope`, or is not a tensor, are skipped.
    pub fn build(ops: &[Box<dyn Operator>], scope: &Scope, table: &ReuseTable) -> Self {
        let mut clusters: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (name, cluster) in table {
            clusters
                .entry(cluster.as_str())
                .or_default()
                .insert(name.as_str());
        }
        let cluster_names = clusters
            .keys()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        let mut plan = Self {
            cluster_buffers: vec![None; cluster_names.len()],
            cluster_sizes: vec![0; cluster_names.len()],
            cluster_names,
            cache: BTreeMap::new(),
        };

        for (op_index, op) in ops.iter().enumerate() {
            for name in op.output_vars(true) {
                let Some(cluster_name) = table.get(&name) else {
                    continue;
                };
                let Some(cluster) = plan.cluster_index(cluster_name) else {
                    continue;
                };
                let (var, reuse_var) = match (scope.find_var(&name), scope.find_var(cluster_name)) {
                    (Some(var), Some(reuse_var)) if var.is_tensor() && reuse_var.is_tensor() => {
                        (var, reuse_var)
                    }
                    _ => {
                        crate::verbose!(
                            "reuse plan skips {} -> {}: missing or not a tensor",
                            name,
                            cluster_name
                        );
                        continue;
                    }
                };
                plan.cluster_sizes[cluster] = reuse_var
                    .with_tensor(|tensor| tensor.memory_size())
                    .unwrap_or(0);
                plan.cluster_buffers[cluster] = Some(reuse_var);
                let entries = plan.cache.entry(op_index).or_default();
                if entries.iter().any(|entry| entry.var.ptr_eq(&var)) {
                    continue;
                }
                entries.push(ReuseEntry {
                    name,
                    var,
                    cluster,
                });
            }
        }
        crate::trace!(
            "reuse plan: {} clusters over {} operators",
            plan.cluster_names.len(),
            plan.cache.len()
        );
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_names.len()
    }

    pub fn cluster_names(&self) -> &[String] {
        &self.cluster_names
    }

    pub fn cluster_index(&self, cluster_name: &str) -> Option<usize> {
        self.cluster_names
            .iter()
            .position(|name| name == cluster_name)
    }

    /// Current representative variable of a cluster.
    pub fn representative(&self, cluster: usize) -> Option<&Variable> {
        self.cluster_buffers.get(cluster).and_then(Option::as_ref)
    }

    /// Size of a cluster's buffer: the larger of the recorded size and the
    /// representative's current size, zero when unknown.
    pub fn cluster_memory_size(&self, cluster: usize) -> usize {
        let recorded = self.cluster_sizes.get(cluster).copied().unwrap_or(0);
        let current = self
            .representative(cluster)
            .and_then(|rep| rep.with_tensor(|tensor| tensor.memory_size()).ok())
            .unwrap_or(0);
        recorded.max(current)
    }

    /// `(output name, cluster index)` pairs recorded for one operator.
    pub fn entries_for(&self, op_index: usize) -> Vec<(String, usize)> {
        self.cache
            .get(&op_index)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| (entry.name.clone(), entry.cluster))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Variables recorded for a cluster, across all operators.
    pub fn cluster_members(&self, cluster: usize) -> Vec<Variable> {
        self.cache
            .values()
            .flatten()
            .filter(|entry| entry.cluster == cluster)
            .map(|entry| entry.var.clone())
            .collect()
    }

    /// Promote any output of `op_index` that outgrew its cluster and re-point
    /// the whole cluster at it.
    ///
    /// An output is compared against the representative's current size, so a
    /// representative that grew outside the plan still wins. When the output
    /// is the representative itself it is compared against the recorded size
    /// instead, so a representative that reallocated still re-points the
    /// other members.
    pub(crate) fn update_after(&mut self, op_index: usize) -> Result<Vec<ClusterGrowth>> {
        let Some(entries) = self.cache.get(&op_index) else {
            return Ok(Vec::new());
        };
        let mut grown = Vec::new();
        for entry in entries {
            let size = entry.var.with_tensor(|tensor| tensor.memory_size())?;
            let rep_size = match &self.cluster_buffers[entry.cluster] {
                Some(rep) if !rep.ptr_eq(&entry.var) => {
                    rep.with_tensor(|tensor| tensor.memory_size())?
                }
                _ => 0,
            };
            let current = self.cluster_sizes[entry.cluster].max(rep_size);
            if size <= current {
                self.cluster_sizes[entry.cluster] = current;
                continue;
            }
            self.cluster_sizes[entry.cluster] = size;
            self.cluster_buffers[entry.cluster] = Some(entry.var.clone());
            let representative = entry.var.get_tensor()?;
            for member in self.cache.values().flatten() {
                if member.cluster != entry.cluster || member.var.ptr_eq(&entry.var) {
                    continue;
                }
                member
                    .var
                    .with_tensor_mut(|tensor| tensor.share_buffer_with(&representative))?;
            }
            let growth = ClusterGrowth {
                cluster: entry.cluster,
                cluster_name: self.cluster_names[entry.cluster].clone(),
                var_name: entry.name.clone(),
                memory_size: size,
            };
            crate::verbose!(
                "cluster {} grew to {} bytes from {}",
                growth.cluster_name,
                growth.memory_size,
                growth.var_name
            );
            grown.push(growth);
        }
        Ok(grown)
    }
}
