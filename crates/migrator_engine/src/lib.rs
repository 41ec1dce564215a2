//! Migrator engine: remote collaborators, content conversion, persistence and
//! the batch pipeline.
mod artifact;
mod cdn;
mod convert;
mod fetch;
mod filename;
mod ledger_store;
mod pacing;
mod persist;
mod pipeline;
mod publish;
mod rehost;
mod retry;
mod sanitize;
mod source;
mod transform;
mod types;

pub use artifact::{build_artifact_document, parse_artifact_document, ArtifactStore, SavedArtifact};
pub use cdn::{
    sign_params, CdnError, CdnStore, CloudinaryCredentials, CloudinaryStore,
    DEFAULT_CLOUDINARY_BASE_URL,
};
pub use convert::{collapse_blank_lines, Converter, Html2MdConverter};
pub use fetch::{FetchSettings, FetchedImage, ImageFetcher, ReqwestImageFetcher};
pub use filename::{artifact_filename, cdn_public_id, MAX_PUBLIC_ID_LEN};
pub use ledger_store::{LedgerError, LedgerStore};
pub use pacing::PacingPolicy;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{
    CampaignStatus, MigrationPipeline, PipelineError, PipelineSettings, DEFAULT_BATCH_SIZE,
};
pub use publish::{HttpDraftPublisher, PublishError, Publisher, SessionCookies};
pub use rehost::{ImageRehoster, RehostError, DEFAULT_CDN_FOLDER};
pub use retry::RetryPolicy;
pub use sanitize::{collect_image_sources, remote_image_url, sanitize_html, DEFAULT_ALT_TEXT};
pub use source::{sort_by_sent_date, BrevoSource, CampaignSource, SourceError, DEFAULT_BREVO_BASE_URL};
pub use transform::{ContentTransformer, TransformOutput};
pub use types::{FailureKind, FetchError, Retryable};
