use apalis::prelude::{Data, Error as ApalisError};
use tracing::{error, info};

use crate::application::queues::DataQueueMessage;

use super::context::{JobWorkerContext, job_failed};

/// Worker entry point for data queue messages.
pub async fn process_data_queue_job(
    message: DataQueueMessage,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    match ctx.reconciler.reconcile(&message).await {
        Ok(outcome) => {
            info!(
                target = "application::jobs::data_queue",
                notification_id = %message.notification_id,
                force_complete = message.force_complete,
                outcome = ?outcome,
                "data queue message processed"
            );
            Ok(())
        }
        Err(err) => {
            error!(
                target = "application::jobs::data_queue",
                notification_id = %message.notification_id,
                error = %err,
                "reconciliation failed"
            );
            Err(job_failed(err))
        }
    }
}
