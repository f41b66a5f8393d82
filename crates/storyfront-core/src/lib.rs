pub mod events;
pub mod models;
pub mod schemas;
pub mod storage;

pub use events::{
    Cta, CtaInput, Impression, ImpressionInput, Purchase, PurchaseInput, Refund, RefundInput,
};
pub use models::{
    CommerceTotals, Creator, CreatorTier, IDEMPOTENCY_TTL_HOURS, IdempotencyRecord, Story,
    StoryPage, StoryWithCreator,
};
pub use schemas::{FieldIssue, ValidationError};
pub use storage::{CatalogStore, CommerceStore, IdempotencyStore, StoreError};
