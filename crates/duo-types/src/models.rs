use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{Draft, ValidationError, optional, required};

pub const TASK_TITLE_MAX: usize = 100;
pub const MESSAGE_MAX: usize = 500;
pub const MOOD_NOTE_MAX: usize = 200;
pub const BUCKET_TITLE_MAX: usize = 50;
pub const BUCKET_NOTES_MAX: usize = 200;
pub const DATE_TITLE_MAX: usize = 50;
pub const DATE_DESCRIPTION_MAX: usize = 100;
pub const PHOTO_URL_MAX: usize = 2048;
pub const PHOTO_CAPTION_MAX: usize = 200;
pub const PARTNER_NAME_MAX: usize = 50;

pub const DEFAULT_DATE_ICON: &str = "📅";

/// Couple-scoped tables. Every row in these belongs to exactly one couple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    Messages,
    MoodEntries,
    BucketList,
    ImportantDates,
    Photos,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Tasks,
        Table::Messages,
        Table::MoodEntries,
        Table::BucketList,
        Table::ImportantDates,
        Table::Photos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::Messages => "messages",
            Table::MoodEntries => "mood_entries",
            Table::BucketList => "bucket_list",
            Table::ImportantDates => "important_dates",
            Table::Photos => "photos",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown table: {s}"))
    }
}

/// A row type living in one of the couple-scoped tables.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    fn id(&self) -> Uuid;
}

// -- Couples --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Couple {
    pub id: Uuid,
    pub couple_code: String,
    pub partner1_name: String,
    pub partner2_name: Option<String>,
    pub anniversary_date: NaiveDate,
    pub theme_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Tasks --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Task {
    const TABLE: Table = Table::Tasks;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTask {
    pub title: String,
}

impl Draft for NewTask {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", &self.title, TASK_TITLE_MAX)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Draft for TaskPatch {
    fn normalized(self) -> Result<Self, ValidationError> {
        let title = match self.title {
            Some(title) => Some(required("title", &title, TASK_TITLE_MAX)?),
            None => None,
        };
        Ok(Self {
            title,
            completed: self.completed,
        })
    }
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub content: String,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Message {
    const TABLE: Table = Table::Messages;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessage {
    pub content: String,
    pub sender_name: String,
}

impl Draft for NewMessage {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            content: required("message", &self.content, MESSAGE_MAX)?,
            sender_name: required("sender name", &self.sender_name, PARTNER_NAME_MAX)?,
        })
    }
}

// -- Moods --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Amazing,
    Happy,
    Okay,
    Sad,
    Stressed,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Amazing => "amazing",
            Mood::Happy => "happy",
            Mood::Okay => "okay",
            Mood::Sad => "sad",
            Mood::Stressed => "stressed",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Mood::Amazing => "🤩",
            Mood::Happy => "😊",
            Mood::Okay => "😐",
            Mood::Sad => "😢",
            Mood::Stressed => "😫",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub partner_name: String,
    pub mood: Mood,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for MoodEntry {
    const TABLE: Table = Table::MoodEntries;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMoodEntry {
    pub partner_name: String,
    pub mood: Mood,
    #[serde(default)]
    pub note: Option<String>,
}

impl Draft for NewMoodEntry {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            partner_name: required("partner name", &self.partner_name, PARTNER_NAME_MAX)?,
            mood: self.mood,
            note: optional("note", self.note, MOOD_NOTE_MAX)?,
        })
    }
}

// -- Bucket list --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Travel,
    Activity,
    Food,
    Adventure,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Travel => "travel",
            Category::Activity => "activity",
            Category::Food => "food",
            Category::Adventure => "adventure",
            Category::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketItem {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub title: String,
    pub category: Category,
    pub priority: Priority,
    pub completed: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Record for BucketItem {
    const TABLE: Table = Table::BucketList;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewBucketItem {
    pub title: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Draft for NewBucketItem {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", &self.title, BUCKET_TITLE_MAX)?,
            category: self.category,
            priority: self.priority,
            notes: optional("notes", self.notes, BUCKET_NOTES_MAX)?,
        })
    }
}

/// `completed_at` is never sent by clients; the store stamps it when
/// `completed` flips to true and clears it when it flips back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Draft for BucketPatch {
    fn normalized(self) -> Result<Self, ValidationError> {
        let title = match self.title {
            Some(title) => Some(required("title", &title, BUCKET_TITLE_MAX)?),
            None => None,
        };
        Ok(Self {
            title,
            completed: self.completed,
        })
    }
}

// -- Important dates --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateKind {
    Anniversary,
    Birthday,
    Special,
    Recurring,
}

impl DateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateKind::Anniversary => "anniversary",
            DateKind::Birthday => "birthday",
            DateKind::Special => "special",
            DateKind::Recurring => "recurring",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportantDate {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: DateKind,
    pub icon: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for ImportantDate {
    const TABLE: Table = Table::ImportantDates;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewImportantDate {
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: DateKind,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Draft for NewImportantDate {
    fn normalized(self) -> Result<Self, ValidationError> {
        let icon = match self.icon.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_DATE_ICON.to_string(),
            Some(icon) => icon.to_string(),
        };
        Ok(Self {
            title: required("title", &self.title, DATE_TITLE_MAX)?,
            date: self.date,
            kind: self.kind,
            icon: Some(icon),
            description: optional("description", self.description, DATE_DESCRIPTION_MAX)?,
        })
    }
}

// -- Photos --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub date_taken: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Photo {
    const TABLE: Table = Table::Photos;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPhoto {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub date_taken: Option<NaiveDate>,
}

impl Draft for NewPhoto {
    fn normalized(self) -> Result<Self, ValidationError> {
        Ok(Self {
            url: required("url", &self.url, PHOTO_URL_MAX)?,
            caption: optional("caption", self.caption, PHOTO_CAPTION_MAX)?,
            date_taken: self.date_taken,
        })
    }
}
