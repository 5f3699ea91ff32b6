// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Closed catalog of supported (cloud, resource type) pairs.
//!
//! Request views are named after the cloud and resource type, so those two
//! values feed into SQL identifiers. They are never interpolated from request
//! input: every supported pair is enumerated here with its view names spelled
//! out, and anything outside the table fails closed before a query is built.

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudId {
    /// Amazon Web Services.
    Aws,
    /// Google Cloud Platform.
    Gcp,
    /// Microsoft Azure.
    Azure,
}

impl CloudId {
    /// Lowercase identifier as it appears in requests and view names.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudId::Aws => "aws",
            CloudId::Gcp => "gcp",
            CloudId::Azure => "azure",
        }
    }
}

impl std::fmt::Display for CloudId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One supported (cloud, resource type) pair with its pre-declared view names.
#[derive(Debug)]
pub struct CatalogEntry {
    /// Cloud provider.
    pub cloud: CloudId,
    /// Resource type identifier (rds, ec2, ...).
    pub resource_type: &'static str,
    /// View holding the resource request rows, keyed by numeric id.
    pub requests_view: &'static str,
    /// View holding the associated security-group ingress rules, keyed by request id.
    pub sg_view: &'static str,
}

/// Every (cloud, resource type) pair the service will query.
static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        cloud: CloudId::Aws,
        resource_type: "rds",
        requests_view: "v_aws_rds_requests",
        sg_view: "v_aws_rds_requests_sg_ingress",
    },
    CatalogEntry {
        cloud: CloudId::Aws,
        resource_type: "ec2",
        requests_view: "v_aws_ec2_requests",
        sg_view: "v_aws_ec2_requests_sg_ingress",
    },
    CatalogEntry {
        cloud: CloudId::Aws,
        resource_type: "s3",
        requests_view: "v_aws_s3_requests",
        sg_view: "v_aws_s3_requests_sg_ingress",
    },
    CatalogEntry {
        cloud: CloudId::Gcp,
        resource_type: "cloudsql",
        requests_view: "v_gcp_cloudsql_requests",
        sg_view: "v_gcp_cloudsql_requests_sg_ingress",
    },
    CatalogEntry {
        cloud: CloudId::Gcp,
        resource_type: "gce",
        requests_view: "v_gcp_gce_requests",
        sg_view: "v_gcp_gce_requests_sg_ingress",
    },
    CatalogEntry {
        cloud: CloudId::Azure,
        resource_type: "vm",
        requests_view: "v_azure_vm_requests",
        sg_view: "v_azure_vm_requests_sg_ingress",
    },
    CatalogEntry {
        cloud: CloudId::Azure,
        resource_type: "sqldb",
        requests_view: "v_azure_sqldb_requests",
        sg_view: "v_azure_sqldb_requests_sg_ingress",
    },
];

/// Resolve a (cloud_id, resource_type) pair to its catalog entry.
///
/// Returns `None` for anything outside the enumerated set. Matching is exact;
/// identifiers are lowercase by convention and no normalization is applied.
pub fn lookup(cloud_id: &str, resource_type: &str) -> Option<&'static CatalogEntry> {
    CATALOG
        .iter()
        .find(|entry| entry.cloud.as_str() == cloud_id && entry.resource_type == resource_type)
}
