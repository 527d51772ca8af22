use std::sync::Arc;

use crate::application::delivery::DeliveryOrchestrator;
use crate::application::drafts::DraftNotificationService;
use crate::application::preview::DraftPreviewService;
use crate::application::summary::SummaryAggregator;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub delivery: Arc<DeliveryOrchestrator>,
    pub drafts: Arc<DraftNotificationService>,
    pub previews: Arc<DraftPreviewService>,
    pub summaries: Arc<SummaryAggregator>,
    pub db: Arc<PostgresRepositories>,
}
