use super::prelude::*;

struct CardPatterns {
    card_header: Regex,
    flash_header: Regex,
    admin_state: Regex,
    oper_state: Regex,
    size: Regex,
    percent_used: Regex,
}

impl CardPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            card_header: Regex::new(r"(?i)^Card\b")?,
            flash_header: Regex::new(r"(?i)^Flash\s*-\s*(cf\d+)")?,
            admin_state: Regex::new(r"(?i)Administrative State\s*:\s*(.+)")?,
            oper_state: Regex::new(r"(?i)Operational state\s*:\s*(.+)")?,
            size: Regex::new(r"(?i)Size\s*:\s*([\d,]+)\s*MB")?,
            percent_used: Regex::new(r"(?i)Percent Used\s*:\s*(\d+)\s*%")?,
        })
    }
}

fn first_capture<'a>(regex: &Regex, line: &'a str) -> Option<&'a str> {
    regex
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Flash health collected from SR OS `show card detail` output.
pub struct SrosCard {
    thresholds: Thresholds,
    record: DeviceRecord,
    missing: Vec<FlashSlot>,
    current_flash: Option<FlashSlot>,
}

impl SrosCard {
    #[cfg(test)]
    pub fn test_device() -> Self {
        Self::new("test-sros.example.com".to_string(), Thresholds::default())
    }

    fn record_state(&mut self, slot: FlashSlot, raw_state: &str) {
        let state = raw_state.trim().to_lowercase();
        let status = FieldStatus::new(state.clone(), state == "up");
        // Each slot is listed once, even when both state lines report it missing
        if status.is_not_equipped() && !self.missing.contains(&slot) {
            debug!("{} reports {slot} as '{state}'", self.record.device);
            self.missing.push(slot);
        }
        self.record.slot_mut(slot).state = status;
    }

    fn record_size(&mut self, slot: FlashSlot, raw_size: &str) {
        let digits = raw_size.replace(',', "");
        match digits.parse::<u64>() {
            Ok(size_mb) => {
                let ok = self.thresholds.expectation(slot).size_ok(size_mb);
                self.record.slot_mut(slot).size = FieldStatus::new(format!("{size_mb} MB"), ok);
            }
            Err(e) => {
                warn!(
                    "{}: ignoring unparseable {slot} size '{raw_size}': {e}",
                    self.record.device
                );
            }
        }
    }

    fn record_percent_used(&mut self, slot: FlashSlot, raw_percent: &str) {
        match raw_percent.parse::<u64>() {
            Ok(percent) => {
                let ok = self.thresholds.percent_ok(percent);
                self.record.slot_mut(slot).percent_used =
                    FieldStatus::new(format!("{percent} %"), ok);
            }
            Err(e) => {
                warn!(
                    "{}: ignoring unparseable {slot} utilisation '{raw_percent}': {e}",
                    self.record.device
                );
            }
        }
    }
}

impl CardInspector for SrosCard {
    const CARD_DETAIL_COMMAND: &'static str = "show card detail | no-more";
    const FILE_LIST_COMMAND: &'static str = "file list | no-more";

    fn new(hostname: String, thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            record: DeviceRecord::new(hostname),
            missing: Vec::new(),
            current_flash: None,
        }
    }

    fn parse_card_detail(&mut self, input_data: &str) -> Result<(), CardReportError> {
        let patterns = CardPatterns::new()?;
        self.current_flash = None;

        for line in input_data.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // A new card or its hardware block ends the previous flash section
            if patterns.card_header.is_match(line) || line.starts_with("Hardware Data") {
                self.current_flash = None;
                continue;
            }

            if let Some(label) = first_capture(&patterns.flash_header, line) {
                self.current_flash = FlashSlot::from_label(label);
                trace!("Flash header '{label}' -> {:?}", self.current_flash);
                continue;
            }

            let Some(slot) = self.current_flash else {
                continue;
            };

            if let Some(state) = first_capture(&patterns.admin_state, line) {
                self.record_state(slot, state);
            } else if let Some(state) = first_capture(&patterns.oper_state, line) {
                self.record_state(slot, state);
            } else if let Some(size) = first_capture(&patterns.size, line) {
                self.record_size(slot, size);
            } else if let Some(percent) = first_capture(&patterns.percent_used, line) {
                self.record_percent_used(slot, percent);
            }
        }

        Ok(())
    }

    fn missing_slots(&self) -> &[FlashSlot] {
        &self.missing
    }

    fn build(self) -> DeviceRecord {
        self.record
    }
}
