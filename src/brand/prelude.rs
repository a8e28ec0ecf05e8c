pub(crate) use crate::{
    CardReportError, DeviceRecord, FieldStatus, FlashSlot, brand::CardInspector,
    config::Thresholds,
};

pub(crate) use tracing::{debug, trace, warn};

pub(crate) use regex::Regex;
