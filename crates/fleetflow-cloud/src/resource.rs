//! Managed resource identity and capabilities
//!
//! Every resource declared in a project implements [`ManagedResource`]. The
//! orchestrator only ever talks to resources through this trait: ordering is
//! decided by [`ManagedResource::create_after`], and resources that manage a
//! bucket advertise it through [`ManagedResource::provides_bucket`] instead
//! of being recognized by their concrete type.

/// A resource whose lifecycle FleetFlow manages.
pub trait ManagedResource: Send + Sync {
    /// Resource type (e.g. "s3-bucket", "s3-bucket-upload")
    fn resource_type(&self) -> &str;

    /// Resource name as declared in the project file
    fn name(&self) -> &str;

    /// Bucket name, if this resource is a bucket resource
    fn provides_bucket(&self) -> Option<&str> {
        None
    }

    /// Keys of resources that must be created before this one
    ///
    /// `resources` is the full set of declared resources, including `self`.
    fn create_after(&self, _resources: &[&dyn ManagedResource]) -> Vec<String> {
        Vec::new()
    }

    /// State key (type:name)
    fn key(&self) -> String {
        format!("{}:{}", self.resource_type(), self.name())
    }

    /// Display string for listings
    fn show_type(&self) -> String {
        self.resource_type().to_string()
    }
}
