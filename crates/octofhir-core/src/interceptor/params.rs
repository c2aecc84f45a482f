//! Parameters handed to interceptors.

use crate::model::Resource;

use super::request::{RequestDetails, TransactionDetails};

/// Resources about to be returned, with a per-index veto.
#[derive(Debug, Clone, Default)]
pub struct PreResourceAccessDetails {
    resources: Vec<Resource>,
    blocked: Vec<bool>,
}

impl PreResourceAccessDetails {
    pub fn new(resources: Vec<Resource>) -> Self {
        let blocked = vec![false; resources.len()];
        Self { resources, blocked }
    }

    pub fn size(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index)
    }

    pub fn set_dont_return_resource_at_index(&mut self, index: usize) {
        if let Some(flag) = self.blocked.get_mut(index) {
            *flag = true;
        }
    }

    pub fn is_dont_return_resource_at_index(&self, index: usize) -> bool {
        self.blocked.get(index).copied().unwrap_or(false)
    }

    /// Resources that were not vetoed, in their original order.
    pub fn into_allowed(self) -> Vec<Resource> {
        self.resources
            .into_iter()
            .zip(self.blocked)
            .filter_map(|(resource, blocked)| (!blocked).then_some(resource))
            .collect()
    }
}

/// Resources about to be shown. Hooks may replace an entry or clear it.
#[derive(Debug, Clone, Default)]
pub struct PreResourceShowDetails {
    resources: Vec<Option<Resource>>,
}

impl PreResourceShowDetails {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources: resources.into_iter().map(Some).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index).and_then(Option::as_ref)
    }

    pub fn set_resource(&mut self, index: usize, resource: Option<Resource>) {
        if let Some(slot) = self.resources.get_mut(index) {
            *slot = resource;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().flatten()
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources.into_iter().flatten().collect()
    }
}

/// Everything a hook may inspect or modify.
///
/// Storage pointcuts populate `old_resource`/`new_resource`; a hook may
/// modify `new_resource` and the store writes the modified value. The
/// access and show pointcuts populate the matching detail object.
#[derive(Debug, Clone, Default)]
pub struct HookParams {
    pub resource_type: Option<String>,
    pub request: Option<RequestDetails>,
    pub transaction: Option<TransactionDetails>,
    pub old_resource: Option<Resource>,
    pub new_resource: Option<Resource>,
    pub access_details: Option<PreResourceAccessDetails>,
    pub show_details: Option<PreResourceShowDetails>,
}

impl HookParams {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            ..Self::default()
        }
    }

    pub fn with_request(mut self, request: &RequestDetails) -> Self {
        self.request = Some(request.clone());
        self
    }

    pub fn with_transaction(mut self, transaction: TransactionDetails) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn with_old_resource(mut self, resource: Option<Resource>) -> Self {
        self.old_resource = resource;
        self
    }

    pub fn with_new_resource(mut self, resource: Resource) -> Self {
        self.new_resource = Some(resource);
        self
    }

    pub fn with_access_details(mut self, details: PreResourceAccessDetails) -> Self {
        self.access_details = Some(details);
        self
    }

    pub fn with_show_details(mut self, details: PreResourceShowDetails) -> Self {
        self.show_details = Some(details);
        self
    }
}
