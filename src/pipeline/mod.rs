// Pipeline module: definitions, dependency resolution, runs and validation
// Author: Gabriel Demetrios Lafis

mod definition;
mod orchestrator;
mod resolver;
mod run;
mod validator;
mod workspace;

pub use definition::*;
pub use orchestrator::*;
pub use resolver::*;
pub use run::*;
pub use validator::*;
pub use workspace::*;
