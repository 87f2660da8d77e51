//! Built-in generators.
//!
//! The chain for a schema run is: the project raises a layout (folders and
//! project file), each datasource-backed table becomes an Entity, and each
//! Entity renders a class file into `Models`.

mod entity;
mod entity_class;
mod project_layout;

pub use entity::EntityGenerator;
pub use entity_class::EntityClassGenerator;
pub use project_layout::ProjectLayoutGenerator;

use std::sync::Arc;

use crate::application::Generator;

/// Folder generated entity classes are written to.
pub const MODELS_FOLDER: &str = "Models";
/// Store id of the template rendering the project file.
pub const PROJECT_FILE_TEMPLATE: &str = "project-file";

/// The default generator set, in subscription order.
pub fn builtin() -> Vec<Arc<dyn Generator>> {
    vec![
        Arc::new(ProjectLayoutGenerator::default()),
        Arc::new(EntityGenerator::new()),
        Arc::new(EntityClassGenerator::new()),
    ]
}
