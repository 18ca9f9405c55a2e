//! The closed set of record types every tenant database carries, plus the
//! collections of the administrative database.

use crate::backend::{CollectionSpec, IndexSpec};

const fn index(name: &'static str, fields: &'static [&'static str]) -> IndexSpec {
    IndexSpec {
        name,
        fields,
        unique: false,
    }
}

const fn unique(name: &'static str, fields: &'static [&'static str]) -> IndexSpec {
    IndexSpec {
        name,
        fields,
        unique: true,
    }
}

pub const CARDS: CollectionSpec = CollectionSpec {
    name: "cards",
    indexes: &[
        unique("card_number", &["cardNumber"]),
        index("callsign", &["callsign"]),
        index("callsign_profile", &["callsignProfile"]),
        index("qr_code", &["qrCode"]),
        index("rfid_uid", &["rfidTag.uid"]),
        index("created_at", &["createdAt"]),
    ],
};

pub const CALLSIGN_PROFILES: CollectionSpec = CollectionSpec {
    name: "callsign_profiles",
    indexes: &[
        unique("callsign_name", &["callsignName"]),
        index("is_default", &["isDefault"]),
    ],
};

pub const CATEGORIES: CollectionSpec = CollectionSpec {
    name: "categories",
    indexes: &[
        unique("parent_name", &["parentId", "name"]),
        index("parent", &["parentId"]),
    ],
};

pub const TAGS: CollectionSpec = CollectionSpec {
    name: "tags",
    indexes: &[unique("name", &["name"])],
};

pub const SENT_CARDS: CollectionSpec = CollectionSpec {
    name: "sent_cards",
    indexes: &[
        unique("card_number", &["cardNumber"]),
        index("callsign", &["callsign"]),
        index("received_card", &["receivedCard"]),
        index("rfid_uid", &["rfidTag.uid"]),
    ],
};

pub const CERTIFICATES: CollectionSpec = CollectionSpec {
    name: "certificates",
    indexes: &[
        unique("certificate_number", &["certificateNumber"]),
        index("card", &["cardId"]),
    ],
};

pub const CERTIFICATE_TEMPLATES: CollectionSpec = CollectionSpec {
    name: "certificate_templates",
    indexes: &[index("type", &["type"])],
};

pub const RFID_DEVICES: CollectionSpec = CollectionSpec {
    name: "rfid_devices",
    indexes: &[index("status", &["status"])],
};

pub const RFID_LOGS: CollectionSpec = CollectionSpec {
    name: "rfid_logs",
    indexes: &[
        index("device", &["deviceId"]),
        index("tag_uid", &["tagUid"]),
        index("card", &["cardId"]),
    ],
};

pub const CALLSIGN_ASSOCIATIONS: CollectionSpec = CollectionSpec {
    name: "callsign_associations",
    indexes: &[
        index("operator_name", &["operatorName"]),
        index("callsign", &["callsigns.callsign"]),
    ],
};

pub const USERS: CollectionSpec = CollectionSpec {
    name: "users",
    indexes: &[
        unique("username", &["username"]),
        unique("email", &["email"]),
        unique("user_database_name", &["userDatabaseName"]),
    ],
};

pub const COUNTERS: CollectionSpec = CollectionSpec {
    name: "counters",
    indexes: &[],
};

/// Record types attached to every tenant database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Card,
    CallsignProfile,
    Category,
    Tag,
    SentCard,
    Certificate,
    CertificateTemplate,
    RfidDevice,
    RfidLog,
    CallsignAssociation,
}

impl RecordType {
    pub const ALL: [RecordType; 10] = [
        RecordType::Card,
        RecordType::CallsignProfile,
        RecordType::Category,
        RecordType::Tag,
        RecordType::SentCard,
        RecordType::Certificate,
        RecordType::CertificateTemplate,
        RecordType::RfidDevice,
        RecordType::RfidLog,
        RecordType::CallsignAssociation,
    ];

    pub fn spec(&self) -> &'static CollectionSpec {
        match self {
            RecordType::Card => &CARDS,
            RecordType::CallsignProfile => &CALLSIGN_PROFILES,
            RecordType::Category => &CATEGORIES,
            RecordType::Tag => &TAGS,
            RecordType::SentCard => &SENT_CARDS,
            RecordType::Certificate => &CERTIFICATES,
            RecordType::CertificateTemplate => &CERTIFICATE_TEMPLATES,
            RecordType::RfidDevice => &RFID_DEVICES,
            RecordType::RfidLog => &RFID_LOGS,
            RecordType::CallsignAssociation => &CALLSIGN_ASSOCIATIONS,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.spec().name
    }
}

/// Collections of the administrative database.
pub const ADMIN_COLLECTIONS: [&CollectionSpec; 2] = [&USERS, &COUNTERS];
