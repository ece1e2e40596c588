use anyhow::Result;

use crate::operator::HookSink;

/// An alternative executor that can take over a prepared program. It
/// receives the executor's hook lists whenever they change.
pub trait DelegateExecutor: HookSink + Send {
    fn run(&mut self, feed_names: &[String], need_fetch: bool) -> Result<()>;
}
