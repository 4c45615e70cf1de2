//! Extension catalogue: package names, namespaces and upgrade ordering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Add-on installed onto a cluster after bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Extension {
    CertManager,
    Contour,
    ExternalDns,
    Harbor,
    Prometheus,
    Grafana,
}

impl Extension {
    /// Extensions tracked on the shared services cluster
    pub const SHARED: [Extension; 4] = [
        Extension::CertManager,
        Extension::Contour,
        Extension::ExternalDns,
        Extension::Harbor,
    ];

    /// Extensions tracked on workload clusters
    pub const WORKLOAD: [Extension; 4] = [
        Extension::CertManager,
        Extension::Contour,
        Extension::Prometheus,
        Extension::Grafana,
    ];

    /// Carvel package name
    pub fn package(self) -> &'static str {
        match self {
            Extension::CertManager => "cert-manager.tanzu.vmware.com",
            Extension::Contour => "contour.tanzu.vmware.com",
            Extension::ExternalDns => "external-dns.tanzu.vmware.com",
            Extension::Harbor => "harbor.tanzu.vmware.com",
            Extension::Prometheus => "prometheus.tanzu.vmware.com",
            Extension::Grafana => "grafana.tanzu.vmware.com",
        }
    }

    /// Installed app / package-install name
    pub fn app(self) -> &'static str {
        match self {
            Extension::CertManager => "cert-manager",
            Extension::Contour => "contour",
            Extension::ExternalDns => "external-dns",
            Extension::Harbor => "harbor",
            Extension::Prometheus => "prometheus",
            Extension::Grafana => "grafana",
        }
    }

    /// Namespace the workload of the extension runs in
    pub fn namespace(self) -> &'static str {
        match self {
            Extension::CertManager => "cert-manager",
            Extension::Contour => "tanzu-system-ingress",
            Extension::ExternalDns => "tanzu-system-service-discovery",
            Extension::Harbor => "tanzu-system-registry",
            Extension::Prometheus => "tanzu-system-monitoring",
            Extension::Grafana => "tanzu-system-dashboards",
        }
    }

    /// Human readable name used in log lines and error messages
    pub fn display_name(self) -> &'static str {
        match self {
            Extension::CertManager => "Cert Manager",
            Extension::Contour => "Contour",
            Extension::ExternalDns => "External DNS",
            Extension::Harbor => "Harbor",
            Extension::Prometheus => "Prometheus",
            Extension::Grafana => "Grafana",
        }
    }

    /// Name of the secret holding the extension's data values
    pub fn data_values_secret(self) -> String {
        format!("{}-data-values", self.app())
    }

    /// Position in the upgrade sequence. Lower ranks go first:
    /// cert-manager, then ingress, then registry/dns/monitoring.
    /// kapp-controller precedes all of them and isn't tracked as a slot.
    pub fn upgrade_rank(self) -> u8 {
        match self {
            Extension::CertManager => 0,
            Extension::Contour => 1,
            Extension::ExternalDns | Extension::Harbor => 2,
            Extension::Prometheus | Extension::Grafana => 2,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.app())
    }
}
