// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status-change notification text.
//!
//! Pure and deterministic: the same transition always yields the same text.

use strum::{Display, EnumString};

use deskrelay_core::StatusChange;

/// Status assumed when a transition does not say where it came from.
pub const DEFAULT_OLD_STATUS: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Th,
}

enum Outcome<'a> {
    Resolved,
    Approved,
    Rejected(Option<&'a str>),
    Updated { old: &'a str, new: &'a str },
}

fn classify<'a>(old: &'a str, new: &'a str, comment: Option<&'a str>) -> Outcome<'a> {
    match new {
        "completed" => Outcome::Resolved,
        "approved" => Outcome::Approved,
        "rejected" => Outcome::Rejected(comment.filter(|c| !c.trim().is_empty())),
        _ => Outcome::Updated { old, new },
    }
}

/// English text for a transition.
pub fn generate(old_status: &str, new_status: &str, topic: &str, comment: Option<&str>) -> String {
    StatusMessages::new(Locale::En).render(old_status, new_status, topic, comment)
}

/// Localized notification text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusMessages {
    locale: Locale,
}

impl StatusMessages {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Noun used when a transition carries no topic.
    pub fn default_topic(&self) -> &'static str {
        match self.locale {
            Locale::En => "request",
            Locale::Th => "คำร้อง",
        }
    }

    pub fn render(
        &self,
        old_status: &str,
        new_status: &str,
        topic: &str,
        comment: Option<&str>,
    ) -> String {
        let outcome = classify(old_status, new_status, comment);
        match self.locale {
            Locale::En => match outcome {
                Outcome::Resolved => format!("{topic} has been resolved"),
                Outcome::Approved => format!("{topic} has been approved"),
                Outcome::Rejected(Some(reason)) => format!("{topic} was rejected: {reason}"),
                Outcome::Rejected(None) => format!("{topic} was rejected"),
                Outcome::Updated { old, new } => {
                    format!("{topic} status updated from {old} to {new}")
                }
            },
            Locale::Th => match outcome {
                Outcome::Resolved => format!("คำร้องเรื่อง \"{topic}\" ได้รับการแก้ไขเรียบร้อยแล้ว"),
                Outcome::Approved => format!("คำร้องเรื่อง \"{topic}\" ได้รับการอนุมัติแล้ว"),
                Outcome::Rejected(Some(reason)) => {
                    format!("คำร้องเรื่อง \"{topic}\" ถูกปฏิเสธ เนื่องจาก: {reason}")
                }
                Outcome::Rejected(None) => format!("คำร้องเรื่อง \"{topic}\" ถูกปฏิเสธ"),
                Outcome::Updated { old, new } => {
                    format!("มีการอัปเดตสถานะคำร้องเรื่อง \"{topic}\" จาก {old} เป็น {new}")
                }
            },
        }
    }

    /// Text for a status change, filling in a missing old status and topic.
    pub fn for_change(&self, change: &StatusChange) -> String {
        self.render(
            change.old_status.as_deref().unwrap_or(DEFAULT_OLD_STATUS),
            &change.new_status,
            change.topic.as_deref().unwrap_or(self.default_topic()),
            change.comment.as_deref(),
        )
    }

    /// Summary alert for notifications delivered while offline.
    pub fn backlog_summary(&self, count: usize) -> String {
        match self.locale {
            Locale::En if count == 1 => "You have 1 new notification".to_string(),
            Locale::En => format!("You have {count} new notifications"),
            Locale::Th => format!("คุณมีการแจ้งเตือนใหม่ {count} รายการ"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_policy_table() {
        assert_eq!(
            generate("pending", "completed", "Printer", None),
            "Printer has been resolved"
        );
        assert_eq!(
            generate("pending", "approved", "Laptop", None),
            "Laptop has been approved"
        );
        assert_eq!(
            generate("pending", "rejected", "VPN", Some("duplicate")),
            "VPN was rejected: duplicate"
        );
        assert_eq!(generate("pending", "rejected", "VPN", None), "VPN was rejected");
        assert_eq!(
            generate("pending", "in_progress", "Email", None),
            "Email status updated from pending to in_progress"
        );
    }

    #[test]
    fn blank_comment_counts_as_none() {
        assert_eq!(generate("pending", "rejected", "VPN", Some("  ")), "VPN was rejected");
    }

    #[test]
    fn thai_templates() {
        let th = StatusMessages::new(Locale::Th);
        assert_eq!(
            th.render("pending", "approved", "ลาพักร้อน", None),
            "คำร้องเรื่อง \"ลาพักร้อน\" ได้รับการอนุมัติแล้ว"
        );
        assert_eq!(
            th.render("pending", "rejected", "ลาพักร้อน", Some("ซ้ำ")),
            "คำร้องเรื่อง \"ลาพักร้อน\" ถูกปฏิเสธ เนื่องจาก: ซ้ำ"
        );
    }

    #[test]
    fn change_defaults_fill_gaps() {
        let change = StatusChange {
            issue_id: "T1".into(),
            new_status: "in_progress".into(),
            ..Default::default()
        };
        assert_eq!(
            StatusMessages::default().for_change(&change),
            "request status updated from pending to in_progress"
        );
    }

    #[test]
    fn locale_parses_from_config_literal() {
        assert_eq!("th".parse::<Locale>().unwrap(), Locale::Th);
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn backlog_summary_pluralizes() {
        let en = StatusMessages::default();
        assert_eq!(en.backlog_summary(1), "You have 1 new notification");
        assert_eq!(en.backlog_summary(3), "You have 3 new notifications");
    }
}
