pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
mod scene;
pub(crate) mod spawner;
