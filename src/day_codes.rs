use chrono::Weekday;
use serde::Serialize;
use serde_json::Value;

/// Maps a stored day code to a weekday.
///
/// Codes follow the school data convention: 1=Monday .. 6=Saturday, with both
/// 7 and 8 meaning Sunday. Anything else has no weekday.
pub fn weekday_from_code(code: i64) -> Option<Weekday> {
    match code {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 | 8 => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_token(token: &str) -> Option<i64> {
    token.trim().parse::<i64>().ok()
}

fn code_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_token(s),
        _ => None,
    }
}

/// Set of weekdays, bit `n` = `n` days from Sunday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_sunday();
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Indices in the 0=Sunday..6=Saturday convention, ascending.
    pub fn indices(self) -> Vec<u32> {
        (0..7).filter(|i| self.0 & (1 << i) != 0).collect()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::default();
        for d in iter {
            set.insert(d);
        }
        set
    }
}

/// Recurring-day specification as it arrives from storage or callers:
/// either `"2,4"` or `[2, 4]` / `["2", "4"]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecurringDays {
    Text(String),
    List(Vec<Value>),
}

impl RecurringDays {
    /// Reads whatever shape the field has. Blank text and non-list,
    /// non-text values count as "no recurring days".
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Text(n.to_string())),
            Value::Array(items) => Some(Self::List(items.clone())),
            _ => None,
        }
    }

    /// Raw numeric codes, in input order. Unreadable tokens are dropped.
    pub fn codes(&self) -> Vec<i64> {
        match self {
            Self::Text(s) => s.split(',').filter_map(parse_token).collect(),
            Self::List(items) => items.iter().filter_map(code_from_value).collect(),
        }
    }

    pub fn weekdays(&self) -> WeekdaySet {
        self.codes()
            .into_iter()
            .filter_map(weekday_from_code)
            .collect()
    }

    /// Every token must be a known code. Used when writing to the workspace.
    pub fn validate_strict(raw: &str) -> Result<String, String> {
        let mut codes: Vec<i64> = Vec::new();
        for token in raw.split(',') {
            let t = token.trim();
            if t.is_empty() {
                continue;
            }
            let code = parse_token(t).ok_or_else(|| format!("invalid day code: {}", t))?;
            if weekday_from_code(code).is_none() {
                return Err(format!("day code out of range 1..=8: {}", code));
            }
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        if codes.is_empty() {
            return Err("recurringDays must name at least one day".into());
        }
        Ok(codes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(","))
    }
}
