pub mod tenant_crud;

pub use tenant_crud::{
    bool_query, into_document, now, require_id, str_field, string_list, Listing, TenantCrud,
};
