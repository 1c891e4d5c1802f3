//! Prelude

pub use crate::{
    analysis::{AnalysisRequest, WasteAnalysis},
    compression::{CompressedImage, CompressionOptions, compress_data_url_or_original},
    conversations::{Conversation, ConversationId, ConversationStatus, Message, Participant},
    identity::{Identity, UserUuid},
    listings::{
        ImageSource, Listing, ListingDraft, ListingStatus, ListingUpdate, ListingUuid,
        sort_newest_first,
    },
    profiles::{ProfileUpdate, UserProfile},
    roles::Role,
};
