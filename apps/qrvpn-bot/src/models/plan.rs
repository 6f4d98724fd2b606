const PAYLOAD_PREFIX: &str = "plan:";
const CALLBACK_PREFIX: &str = "buy_";

/// Subscription tiers sold through Telegram invoices (RUB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    ThreeMonths,
    SixMonths,
    Year,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::ThreeMonths, Plan::SixMonths, Plan::Year];

    pub fn code(self) -> &'static str {
        match self {
            Plan::ThreeMonths => "3m",
            Plan::SixMonths => "6m",
            Plan::Year => "12m",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    pub fn days(self) -> i64 {
        match self {
            Plan::ThreeMonths => 90,
            Plan::SixMonths => 180,
            Plan::Year => 365,
        }
    }

    pub fn price_rub(self) -> u32 {
        match self {
            Plan::ThreeMonths => 600,
            Plan::SixMonths => 900,
            Plan::Year => 1350,
        }
    }

    /// Invoice amount in kopecks.
    pub fn price_minor(self) -> u32 {
        self.price_rub() * 100
    }

    pub fn title(self) -> &'static str {
        match self {
            Plan::ThreeMonths => "Тариф 3 мес.",
            Plan::SixMonths => "Тариф 6 мес.",
            Plan::Year => "Тариф 1 год",
        }
    }

    pub fn button_label(self) -> String {
        match self {
            Plan::ThreeMonths => format!("{} - {} руб.", self.title(), self.price_rub()),
            Plan::SixMonths => format!("{} - {} руб. (скидка 50% 🔥)", self.title(), self.price_rub()),
            Plan::Year => format!("{} - {} руб. (скидка 70% 🔥)", self.title(), self.price_rub()),
        }
    }

    pub fn to_payload_string(self) -> String {
        format!("{}{}", PAYLOAD_PREFIX, self.code())
    }

    pub fn from_payload(payload: &str) -> Option<Self> {
        payload.strip_prefix(PAYLOAD_PREFIX).and_then(Self::from_code)
    }

    pub fn callback_data(self) -> String {
        format!("{}{}", CALLBACK_PREFIX, self.code())
    }

    pub fn from_callback(data: &str) -> Option<Self> {
        data.strip_prefix(CALLBACK_PREFIX).and_then(Self::from_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_resolve_to_their_plan() {
        assert_eq!(Plan::from_payload("plan:3m"), Some(Plan::ThreeMonths));
        assert_eq!(Plan::from_payload("plan:12m"), Some(Plan::Year));
        assert_eq!(Plan::from_payload(&Plan::SixMonths.to_payload_string()), Some(Plan::SixMonths));
    }

    #[test]
    fn foreign_payloads_are_rejected() {
        assert_eq!(Plan::from_payload("plan:1d"), None);
        assert_eq!(Plan::from_payload("topup:5"), None);
        assert_eq!(Plan::from_callback("plan:3m"), None);
    }

    #[test]
    fn prices_are_in_kopecks() {
        assert_eq!(Plan::Year.price_minor(), 135_000);
        assert_eq!(Plan::ThreeMonths.days(), 90);
    }
}
