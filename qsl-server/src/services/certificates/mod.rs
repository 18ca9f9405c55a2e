pub mod certificate_templates_schema;
pub mod certificate_templates_service;
pub mod certificates_service;
pub mod certificates_shared;

pub use certificate_templates_service::CertificateTemplatesService;
pub use certificates_service::CertificatesService;
