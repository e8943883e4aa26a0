#![allow(clippy::unwrap_used)]
pub mod arbitrary;

use std::cell::RefCell;
use std::convert::Infallible;

use crate::auth::Workloads;
use crate::config::Resource;

pub use host::MockHost;

/// Records every listing and returns no workloads.
#[derive(Debug, Default)]
pub struct MockWorkloads {
    calls: RefCell<Vec<(Resource, String, String)>>,
}

impl MockWorkloads {
    /// The `(resource, namespace, label selector)` of every listing so far.
    pub fn calls(&self) -> Vec<(Resource, String, String)> {
        self.calls.borrow().clone()
    }
}

impl Workloads for MockWorkloads {
    type Error = Infallible;

    fn list(
        &self,
        resource: &Resource,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<serde_json::Value>, Self::Error> {
        self.calls.borrow_mut().push((
            resource.clone(),
            namespace.to_owned(),
            label_selector.to_owned(),
        ));
        Ok(Vec::new())
    }
}
