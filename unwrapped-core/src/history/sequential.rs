//! Single-cursor walk.

use super::{fetch_with_retry, oldest, strip_anchor, Cursor, HistoryWalker, WalkStats};
use crate::analytics::Aggregator;
use crate::error::Result;
use crate::source::HistoryRequest;
use crate::types::ChannelPeer;

impl HistoryWalker {
    /// Page backward from `now` until the window start, folding as we go.
    ///
    /// Any error that survives the retry policy aborts the walk.
    pub async fn walk_sequential(
        &self,
        peer: ChannelPeer,
        aggregator: &mut Aggregator,
        now: i64,
    ) -> Result<WalkStats> {
        let settings = &self.settings;
        let mut stats = WalkStats::default();
        let mut cursor = Cursor::open(now);
        let mut anchor: Option<i64> = None;

        while cursor.date > settings.window_start {
            let request = HistoryRequest {
                peer,
                offset_date: cursor.date,
                offset_id: cursor.id,
                limit: settings.page_size,
            };
            let page = fetch_with_retry(self.source.as_ref(), &request, &settings.retry).await?;
            stats.pages += 1;

            let Some(next) = oldest(&page) else {
                tracing::debug!(offset_date = cursor.date, "Empty page, history exhausted");
                break;
            };

            for msg in strip_anchor(&page, anchor) {
                if msg.date <= settings.window_start {
                    stats.out_of_window += 1;
                } else if aggregator.fold(msg) {
                    stats.folded += 1;
                } else {
                    stats.duplicates += 1;
                }
            }

            if next >= cursor {
                tracing::warn!(
                    offset_date = cursor.date,
                    offset_id = cursor.id,
                    "Cursor did not move backward, stopping walk"
                );
                break;
            }
            if page.len() < settings.page_size {
                break;
            }
            cursor = next;
            anchor = Some(next.id);
        }

        Ok(stats)
    }
}
