pub mod nokia;
pub(crate) mod prelude;

use prelude::*;

/// Commands and output parsing for one vendor's card inventory.
pub trait CardInspector {
    /// Command whose output is parsed for flash health.
    const CARD_DETAIL_COMMAND: &'static str;
    /// Command whose output is only captured for the raw dump.
    const FILE_LIST_COMMAND: &'static str;

    fn new(hostname: String, thresholds: Thresholds) -> Self;
    fn parse_card_detail(&mut self, input_data: &str) -> Result<(), CardReportError>;
    /// Slots reported as not equipped, in first-seen order.
    fn missing_slots(&self) -> &[FlashSlot];
    fn build(self) -> DeviceRecord;
}
