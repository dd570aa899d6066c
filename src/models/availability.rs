use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: i64,
    pub tutor_id: i64,
    /// 0 = Sunday, matching the frontend's weekday numbering.
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
    /// Dated slots apply to one calendar day; undated slots recur weekly.
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        match self.date {
            Some(d) => d == date,
            None => date.weekday().num_days_from_sunday() == u32::from(self.day_of_week),
        }
    }

    fn bounds(&self) -> Option<(NaiveTime, NaiveTime)> {
        Some((parse_time(&self.start_time).ok()?, parse_time(&self.end_time).ok()?))
    }

    /// True when `[start, end)` sits entirely inside this slot on a day it applies to.
    pub fn contains(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> bool {
        let Some((slot_start, slot_end)) = self.bounds() else {
            return false;
        };
        let day = start.date_naive();
        if !self.applies_to(day) || end.date_naive() != day {
            return false;
        }
        start.time() >= slot_start && end.time() <= slot_end
    }

    /// True when `[start, end)` intersects this slot on any day the window touches.
    pub fn overlaps(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> bool {
        let Some((slot_start, slot_end)) = self.bounds() else {
            return false;
        };
        let first = start.date_naive();
        let last = end.date_naive();
        let intersects = |day: NaiveDate| {
            let window_start = day.and_time(slot_start).and_utc();
            let window_end = day.and_time(slot_end).and_utc();
            *start < window_end && *end > window_start
        };

        match self.date {
            Some(date) => date >= first && date <= last && intersects(date),
            // Eight consecutive days include every weekday in full.
            None => first
                .iter_days()
                .take_while(|day| *day <= last)
                .take(8)
                .any(|day| self.applies_to(day) && intersects(day)),
        }
    }

    pub fn label(&self) -> String {
        let day = match self.date {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => DAY_NAMES
                .get(usize::from(self.day_of_week))
                .copied()
                .unwrap_or("?")
                .to_string(),
        };
        format!("{day} {}-{}", self.start_time, self.end_time)
    }
}

/// Human readable summary of the available slots, recurring days first.
pub fn describe_slots(slots: &[AvailabilitySlot]) -> String {
    let mut sorted: Vec<&AvailabilitySlot> = slots.iter().filter(|s| s.is_available).collect();
    sorted.sort_by(|a, b| {
        (a.date, a.day_of_week, &a.start_time).cmp(&(b.date, b.day_of_week, &b.start_time))
    });
    sorted
        .iter()
        .map(|s| s.label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAvailabilitySlot {
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl NewAvailabilitySlot {
    /// Validates the request and returns it with times normalized to `HH:MM`.
    pub fn normalized(self) -> Result<Self, String> {
        if !(0..=6).contains(&self.day_of_week) {
            return Err("\"dayOfWeek\" must be between 0 and 6".to_string());
        }
        let start = parse_time(&self.start_time)
            .map_err(|_| "\"startTime\" must be in HH:MM format".to_string())?;
        let end = parse_time(&self.end_time)
            .map_err(|_| "\"endTime\" must be in HH:MM format".to_string())?;
        if end <= start {
            return Err("\"endTime\" must be after \"startTime\"".to_string());
        }
        if let Some(date) = self.date {
            if i64::from(date.weekday().num_days_from_sunday()) != self.day_of_week {
                return Err("\"dayOfWeek\" does not match \"date\"".to_string());
            }
        }
        Ok(Self {
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
            ..self
        })
    }
}

/// Accepts `H:MM` or `HH:MM`, 24-hour clock.
pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid time format: {s}"))?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = hour
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}
