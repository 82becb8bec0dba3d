//! Local service-identity provider.
//!
//! The fabric never decides who the local instance is; the identity is
//! supplied by the hosting process (typically assembled from configuration
//! and the discovery layer) and read through this seam.

use crate::types::ServiceInfo;

/// Supplies the local instance's advertisement.
pub trait ServiceInfoProvider: Send + Sync {
    /// The local instance's current advertisement.
    fn service_info(&self) -> ServiceInfo;

    /// The local instance's id.
    fn service_id(&self) -> String {
        self.service_info().service_id
    }
}

/// Provider backed by a fixed advertisement, for single-process deployments
/// and tests.
#[derive(Debug, Clone)]
pub struct StaticServiceInfoProvider {
    info: ServiceInfo,
}

impl StaticServiceInfoProvider {
    /// Create a provider that always returns `info`.
    pub fn new(info: ServiceInfo) -> Self {
        Self { info }
    }
}

impl ServiceInfoProvider for StaticServiceInfoProvider {
    fn service_info(&self) -> ServiceInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceType;

    #[test]
    fn test_static_provider() {
        let info = ServiceInfo::new("core-1", &[ServiceType::TbCore]);
        let provider = StaticServiceInfoProvider::new(info.clone());
        assert_eq!(provider.service_info(), info);
        assert_eq!(provider.service_id(), "core-1");
    }
}
