//! `operations` crate — the Feishu Project operation catalog.
//!
//! Each module contributes one [`ResourceDescriptor`] with its operations.
//! [`catalog`] is the static list the engine's registry is built from.

pub mod attachment;
pub mod comment;
pub mod space;
pub mod user;
pub mod view;
pub mod work_item;
pub mod workflow_node;

mod support;

#[cfg(test)]
mod testing;

use nodes::ResourceDescriptor;

/// Every resource this node exposes.
pub fn catalog() -> Vec<ResourceDescriptor> {
    vec![
        space::resource(),
        work_item::instance_resource(),
        work_item::search_resource(),
        workflow_node::resource(),
        view::resource(),
        comment::resource(),
        attachment::resource(),
        user::resource(),
    ]
}
