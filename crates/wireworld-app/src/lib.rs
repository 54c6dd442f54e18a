//! Shared application plumbing for the Wireworld terminal shell.

use std::sync::{Arc, Mutex};

use wireworld_core::Simulation;

pub type SharedSimulation = Arc<Mutex<Simulation>>;

pub mod loader;
pub mod terminal;

pub mod renderer {
    use anyhow::Result;

    use crate::SharedSimulation;

    /// Shared context passed to renderer implementations.
    pub struct RendererContext {
        pub simulation: SharedSimulation,
    }

    pub trait Renderer {
        /// Stable identifier describing the renderer implementation.
        fn name(&self) -> &'static str;

        /// Launch the renderer; blocks until the rendering session completes.
        fn run(&self, ctx: RendererContext) -> Result<()>;
    }
}
