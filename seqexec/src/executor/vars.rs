use std::sync::Arc;

use anyhow::Result;

use crate::program::{ProgramDesc, EMPTY_VAR_NAME};
use crate::scope::{initialize_variable, Scope};

use super::NaiveExecutor;

impl NaiveExecutor {
    /// Create the variables declared by `block_id` for one persistence pass.
    ///
    /// Persistable variables go to the root ancestor of `scope` and are only
    /// created when the root does not hold them yet. The other pass finds or
    /// creates every non-persistable variable in `scope` itself. A variable
    /// that already holds a value of its declared type keeps it, so handles
    /// taken earlier stay valid.
    ///
    /// Scope parent links are weak and only ever point at an older scope, so
    /// the root walk always terminates.
    pub fn create_variables(
        &self,
        program: &ProgramDesc,
        block_id: usize,
        persistable: bool,
        scope: &Arc<Scope>,
    ) -> Result<()> {
        let root = scope.root();
        let block = program.block(block_id)?;

        let mut created = 0usize;
        for var in &block.vars {
            if var.name == EMPTY_VAR_NAME || var.persistable != persistable {
                continue;
            }
            let target = if persistable {
                if root.has_local_var(&var.name) {
                    continue;
                }
                root.var(&var.name)
            } else {
                scope.var(&var.name)
            };
            if target.var_type() != Some(var.var_type) {
                initialize_variable(&target, var.var_type)?;
                created += 1;
            }
            crate::verbose!(
                "create {} variable {} ({:?})",
                if persistable { "persistable" } else { "local" },
                var.name,
                var.var_type
            );
        }
        crate::trace!(
            "block {}: initialized {} {} variables",
            block_id,
            created,
            if persistable { "persistable" } else { "local" }
        );
        Ok(())
    }
}
