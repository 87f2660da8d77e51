//! Datasource preview: reading sample rows through a datasource-backed
//! table.

use tracing::{Instrument, Span, debug};
use tokio_util::sync::CancellationToken;

use crate::{
    application::{ApplicationError, ports::RowSource},
    domain::{ArtifactTree, DatasourceBacked, DomainError, Row},
    error::CodeloomResult,
};

impl DatasourceBacked {
    /// Load up to `max_rows` rows of the decorated table from `source`.
    ///
    /// The read runs inside `span`. A detached decorator fails with
    /// [`DomainError::DecoratorDetached`].
    pub async fn load_data(
        &self,
        tree: &ArtifactTree,
        source: &dyn RowSource,
        span: &Span,
        filter: Option<&str>,
        max_rows: usize,
        cancel: &CancellationToken,
    ) -> CodeloomResult<Vec<Row>> {
        let table = tree
            .get(self.table()?)
            .ok_or(DomainError::ArtifactNotFound { id: self.table()? })?;
        let datasource = tree
            .get(self.datasource()?)
            .ok_or(DomainError::ArtifactNotFound {
                id: self.datasource()?,
            })?;

        if cancel.is_cancelled() {
            return Err(ApplicationError::Cancelled.into());
        }

        let mut rows = source
            .read_rows(datasource.label(), table.label(), filter, max_rows, cancel)
            .instrument(span.clone())
            .await?;
        rows.truncate(max_rows);

        span.in_scope(|| {
            debug!(
                datasource = datasource.label(),
                table = table.label(),
                rows = rows.len(),
                "Loaded preview rows"
            )
        });
        Ok(rows)
    }
}
