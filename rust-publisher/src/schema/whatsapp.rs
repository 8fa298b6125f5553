//! Shapes of the WhatsApp Cloud API webhook notification.
//!
//! Reference: https://developers.facebook.com/docs/whatsapp/cloud-api/webhooks/components
//!
//! Message content fields are independent optional records. The `type`
//! discriminator names the one that is expected, but extra content fields are
//! accepted because real payloads sometimes carry them.

use super::shape::{optional, required, Kind, ObjectShape};

pub const MESSAGE_TYPES: &[&str] = &[
    "text",
    "image",
    "video",
    "audio",
    "document",
    "sticker",
    "location",
    "contacts",
    "reaction",
    "button",
    "interactive",
    "order",
    "system",
    "unknown",
];

pub const STATUS_VALUES: &[&str] = &["sent", "delivered", "read", "failed"];

pub const INTERACTIVE_TYPES: &[&str] = &["button_reply", "list_reply"];

pub const SYSTEM_TYPES: &[&str] = &["customer_changed_number", "customer_identity_changed"];

// =============================================================================
// Value-level records
// =============================================================================

pub static PROFILE: ObjectShape = ObjectShape {
    name: "profile",
    fields: &[required("name", Kind::String)],
};

pub static CONTACT: ObjectShape = ObjectShape {
    name: "contact",
    fields: &[
        required("profile", Kind::Object(&PROFILE)),
        required("wa_id", Kind::String),
    ],
};

pub static METADATA: ObjectShape = ObjectShape {
    name: "metadata",
    fields: &[
        required("phone_number_id", Kind::String),
        required("display_phone_number", Kind::String),
    ],
};

pub static ERROR_DATA: ObjectShape = ObjectShape {
    name: "error_data",
    fields: &[required("details", Kind::String)],
};

pub static ERROR: ObjectShape = ObjectShape {
    name: "error",
    fields: &[
        required("code", Kind::Number),
        required("title", Kind::String),
        optional("message", Kind::String),
        optional("error_data", Kind::Object(&ERROR_DATA)),
    ],
};

// =============================================================================
// Media
// =============================================================================

pub static IMAGE: ObjectShape = ObjectShape {
    name: "image",
    fields: &[
        required("id", Kind::String),
        required("mime_type", Kind::String),
        required("sha256", Kind::String),
        optional("caption", Kind::String),
    ],
};

pub static VIDEO: ObjectShape = ObjectShape {
    name: "video",
    fields: &[
        required("id", Kind::String),
        required("mime_type", Kind::String),
        required("sha256", Kind::String),
        optional("caption", Kind::String),
    ],
};

/// Voice notes arrive as audio, sometimes without a hash.
pub static AUDIO: ObjectShape = ObjectShape {
    name: "audio",
    fields: &[
        required("id", Kind::String),
        required("mime_type", Kind::String),
        optional("sha256", Kind::String),
    ],
};

pub static DOCUMENT: ObjectShape = ObjectShape {
    name: "document",
    fields: &[
        required("id", Kind::String),
        required("mime_type", Kind::String),
        required("sha256", Kind::String),
        required("filename", Kind::String),
        optional("caption", Kind::String),
    ],
};

pub static STICKER: ObjectShape = ObjectShape {
    name: "sticker",
    fields: &[
        required("id", Kind::String),
        required("mime_type", Kind::String),
        required("sha256", Kind::String),
        optional("animated", Kind::Boolean),
    ],
};

// =============================================================================
// Message content
// =============================================================================

pub static TEXT: ObjectShape = ObjectShape {
    name: "text",
    fields: &[required("body", Kind::String)],
};

pub static LOCATION: ObjectShape = ObjectShape {
    name: "location",
    fields: &[
        required("latitude", Kind::Number),
        required("longitude", Kind::Number),
        optional("name", Kind::String),
        optional("address", Kind::String),
    ],
};

pub static CONTACT_ADDRESS: ObjectShape = ObjectShape {
    name: "address",
    fields: &[
        optional("street", Kind::String),
        optional("city", Kind::String),
        optional("state", Kind::String),
        optional("zip", Kind::String),
        optional("country", Kind::String),
        optional("country_code", Kind::String),
        optional("type", Kind::String),
    ],
};

pub static CONTACT_EMAIL: ObjectShape = ObjectShape {
    name: "email",
    fields: &[
        optional("email", Kind::String),
        optional("type", Kind::String),
    ],
};

pub static CONTACT_NAME: ObjectShape = ObjectShape {
    name: "name",
    fields: &[
        required("formatted_name", Kind::String),
        optional("first_name", Kind::String),
        optional("last_name", Kind::String),
        optional("middle_name", Kind::String),
        optional("suffix", Kind::String),
        optional("prefix", Kind::String),
    ],
};

pub static CONTACT_ORG: ObjectShape = ObjectShape {
    name: "org",
    fields: &[
        optional("company", Kind::String),
        optional("department", Kind::String),
        optional("title", Kind::String),
    ],
};

pub static CONTACT_PHONE: ObjectShape = ObjectShape {
    name: "phone",
    fields: &[
        optional("phone", Kind::String),
        optional("wa_id", Kind::String),
        optional("type", Kind::String),
    ],
};

pub static CONTACT_URL: ObjectShape = ObjectShape {
    name: "url",
    fields: &[
        optional("url", Kind::String),
        optional("type", Kind::String),
    ],
};

/// A contact card shared inside a message.
pub static SHARED_CONTACT: ObjectShape = ObjectShape {
    name: "shared_contact",
    fields: &[
        optional("addresses", Kind::ObjectArray(&CONTACT_ADDRESS)),
        optional("birthday", Kind::String),
        optional("emails", Kind::ObjectArray(&CONTACT_EMAIL)),
        required("name", Kind::Object(&CONTACT_NAME)),
        optional("org", Kind::Object(&CONTACT_ORG)),
        optional("phones", Kind::ObjectArray(&CONTACT_PHONE)),
        optional("urls", Kind::ObjectArray(&CONTACT_URL)),
    ],
};

pub static REACTION: ObjectShape = ObjectShape {
    name: "reaction",
    fields: &[
        required("message_id", Kind::String),
        required("emoji", Kind::String),
    ],
};

pub static BUTTON_REPLY: ObjectShape = ObjectShape {
    name: "button_reply",
    fields: &[
        required("id", Kind::String),
        required("title", Kind::String),
    ],
};

pub static LIST_REPLY: ObjectShape = ObjectShape {
    name: "list_reply",
    fields: &[
        required("id", Kind::String),
        required("title", Kind::String),
        optional("description", Kind::String),
    ],
};

pub static INTERACTIVE: ObjectShape = ObjectShape {
    name: "interactive",
    fields: &[
        required("type", Kind::Enum(INTERACTIVE_TYPES)),
        optional("button_reply", Kind::Object(&BUTTON_REPLY)),
        optional("list_reply", Kind::Object(&LIST_REPLY)),
    ],
};

pub static PRODUCT_ITEM: ObjectShape = ObjectShape {
    name: "product_item",
    fields: &[
        required("product_retailer_id", Kind::String),
        required("quantity", Kind::String),
        required("item_price", Kind::String),
        required("currency", Kind::String),
    ],
};

pub static ORDER: ObjectShape = ObjectShape {
    name: "order",
    fields: &[
        required("catalog_id", Kind::String),
        optional("text", Kind::String),
        required("product_items", Kind::ObjectArray(&PRODUCT_ITEM)),
    ],
};

/// Click-to-WhatsApp ad referral.
pub static REFERRAL: ObjectShape = ObjectShape {
    name: "referral",
    fields: &[
        required("source_url", Kind::String),
        required("source_type", Kind::String),
        required("source_id", Kind::String),
        optional("headline", Kind::String),
        optional("body", Kind::String),
        optional("media_type", Kind::String),
        optional("image_url", Kind::String),
        optional("video_url", Kind::String),
        optional("thumbnail_url", Kind::String),
        optional("ctwa_clid", Kind::String),
    ],
};

/// Customer number or identity changes.
pub static SYSTEM: ObjectShape = ObjectShape {
    name: "system",
    fields: &[
        optional("body", Kind::String),
        optional("identity", Kind::String),
        optional("new_wa_id", Kind::String),
        optional("wa_id", Kind::String),
        optional("type", Kind::Enum(SYSTEM_TYPES)),
        optional("customer", Kind::String),
        optional("group_id", Kind::String),
    ],
};

pub static IDENTITY: ObjectShape = ObjectShape {
    name: "identity",
    fields: &[
        optional("acknowledged", Kind::Boolean),
        optional("created_timestamp", Kind::String),
        optional("hash", Kind::String),
    ],
};

pub static REFERRED_PRODUCT: ObjectShape = ObjectShape {
    name: "referred_product",
    fields: &[
        required("catalog_id", Kind::String),
        required("product_retailer_id", Kind::String),
    ],
};

/// Reply and forwarding context.
pub static CONTEXT: ObjectShape = ObjectShape {
    name: "context",
    fields: &[
        optional("forwarded", Kind::Boolean),
        optional("frequently_forwarded", Kind::Boolean),
        optional("from", Kind::String),
        optional("id", Kind::String),
        optional("referred_product", Kind::Object(&REFERRED_PRODUCT)),
    ],
};

pub static MESSAGE: ObjectShape = ObjectShape {
    name: "message",
    fields: &[
        required("id", Kind::String),
        required("from", Kind::String),
        required("timestamp", Kind::String),
        required("type", Kind::Enum(MESSAGE_TYPES)),
        optional("text", Kind::Object(&TEXT)),
        optional("image", Kind::Object(&IMAGE)),
        optional("video", Kind::Object(&VIDEO)),
        optional("audio", Kind::Object(&AUDIO)),
        optional("document", Kind::Object(&DOCUMENT)),
        optional("sticker", Kind::Object(&STICKER)),
        optional("location", Kind::Object(&LOCATION)),
        optional("contacts", Kind::ObjectArray(&SHARED_CONTACT)),
        optional("reaction", Kind::Object(&REACTION)),
        optional("button", Kind::Object(&BUTTON_REPLY)),
        optional("interactive", Kind::Object(&INTERACTIVE)),
        optional("order", Kind::Object(&ORDER)),
        optional("system", Kind::Object(&SYSTEM)),
        optional("referral", Kind::Object(&REFERRAL)),
        optional("context", Kind::Object(&CONTEXT)),
        optional("identity", Kind::Object(&IDENTITY)),
        optional("errors", Kind::ObjectArray(&ERROR)),
    ],
};

// =============================================================================
// Statuses
// =============================================================================

pub static PRICING: ObjectShape = ObjectShape {
    name: "pricing",
    fields: &[
        required("billable", Kind::Boolean),
        required("category", Kind::String),
        required("pricing_model", Kind::String),
    ],
};

pub static ORIGIN: ObjectShape = ObjectShape {
    name: "origin",
    fields: &[required("type", Kind::String)],
};

pub static CONVERSATION: ObjectShape = ObjectShape {
    name: "conversation",
    fields: &[
        required("id", Kind::String),
        required("origin", Kind::Object(&ORIGIN)),
        optional("expiration_timestamp", Kind::String),
    ],
};

pub static STATUS: ObjectShape = ObjectShape {
    name: "status",
    fields: &[
        required("id", Kind::String),
        required("status", Kind::Enum(STATUS_VALUES)),
        required("timestamp", Kind::String),
        required("recipient_id", Kind::String),
        optional("conversation", Kind::Object(&CONVERSATION)),
        optional("pricing", Kind::Object(&PRICING)),
        optional("errors", Kind::ObjectArray(&ERROR)),
        optional("biz_opaque_callback_data", Kind::String),
    ],
};

// =============================================================================
// Envelope
// =============================================================================

pub static VALUE: ObjectShape = ObjectShape {
    name: "value",
    fields: &[
        required("messaging_product", Kind::String),
        required("metadata", Kind::Object(&METADATA)),
        optional("contacts", Kind::ObjectArray(&CONTACT)),
        optional("messages", Kind::ObjectArray(&MESSAGE)),
        optional("statuses", Kind::ObjectArray(&STATUS)),
        optional("errors", Kind::ObjectArray(&ERROR)),
    ],
};

pub static CHANGE: ObjectShape = ObjectShape {
    name: "change",
    fields: &[
        required("field", Kind::String),
        required("value", Kind::Object(&VALUE)),
    ],
};

pub static ENTRY: ObjectShape = ObjectShape {
    name: "entry",
    fields: &[
        required("id", Kind::String),
        required("changes", Kind::ObjectArray(&CHANGE)),
    ],
};

/// Top-level webhook notification.
pub static WEBHOOK: ObjectShape = ObjectShape {
    name: "webhook",
    fields: &[
        required("object", Kind::String),
        required("entry", Kind::ObjectArray(&ENTRY)),
    ],
};
