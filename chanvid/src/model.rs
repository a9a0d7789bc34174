use serde::{Deserialize, Serialize};

/// Address of a document's bytes on the remote side. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub id: i64,
    pub access_hash: i64,
    #[serde(default)]
    pub file_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub remote_id: i64,
    pub total_size: u64,
    pub suggested_name: Option<String>,
    pub location: FileLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub id: i64,
    pub access_hash: i64,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl ChannelHandle {
    pub fn display_name(&self) -> String {
        match self.username.as_deref().filter(|name| !name.is_empty()) {
            Some(username) => format!("{} (@{})", self.title, username),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "_")]
pub enum DialogsPage {
    #[serde(rename = "messages.dialogs")]
    Dialogs { chats: Vec<Chat> },
    #[serde(rename = "messages.dialogsSlice")]
    DialogsSlice {
        #[serde(default)]
        count: u32,
        chats: Vec<Chat>,
    },
    #[serde(rename = "messages.dialogsNotModified")]
    NotModified {
        #[serde(default)]
        count: u32,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "_")]
pub enum Chat {
    #[serde(rename = "channel")]
    Channel {
        id: i64,
        access_hash: i64,
        title: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        left: bool,
    },
    #[serde(rename = "chat")]
    Chat {
        id: i64,
        title: String,
        #[serde(default)]
        left: bool,
    },
    #[serde(rename = "channelForbidden", alias = "chatForbidden")]
    Forbidden { id: i64 },
}

impl Chat {
    /// Joined chats become selectable handles; left and forbidden ones do not.
    pub fn into_handle(self) -> Option<ChannelHandle> {
        match self {
            Chat::Channel {
                id,
                access_hash,
                title,
                username,
                left,
            } => (!left).then_some(ChannelHandle {
                id,
                access_hash,
                title,
                username,
            }),
            Chat::Chat { id, title, left } => (!left).then_some(ChannelHandle {
                id,
                access_hash: 0,
                title,
                username: None,
            }),
            Chat::Forbidden { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "_")]
pub enum HistoryPage {
    #[serde(rename = "messages.channelMessages")]
    ChannelMessages {
        #[serde(default)]
        count: u32,
        messages: Vec<Message>,
    },
    #[serde(rename = "messages.messagesSlice")]
    MessagesSlice {
        #[serde(default)]
        count: u32,
        messages: Vec<Message>,
    },
    #[serde(rename = "messages.messages")]
    Messages { messages: Vec<Message> },
    #[serde(rename = "messages.messagesNotModified")]
    NotModified {
        #[serde(default)]
        count: u32,
    },
}

impl HistoryPage {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            HistoryPage::ChannelMessages { messages, .. }
            | HistoryPage::MessagesSlice { messages, .. }
            | HistoryPage::Messages { messages } => messages,
            HistoryPage::NotModified { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "_")]
pub enum Message {
    #[serde(rename = "message")]
    Message(MessageBody),
    #[serde(rename = "messageService")]
    Service { id: i32 },
    #[serde(rename = "messageEmpty")]
    Empty { id: i32 },
}

impl Message {
    pub fn id(&self) -> i32 {
        match self {
            Message::Message(body) => body.id,
            Message::Service { id } | Message::Empty { id } => *id,
        }
    }

    /// The attached document, if this message carries a video.
    pub fn video_document(&self) -> Option<&Document> {
        let Message::Message(body) = self else {
            return None;
        };
        match body.media.as_ref()? {
            MessageMedia::Document { document } if document.is_video() => Some(document),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    pub id: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub media: Option<MessageMedia>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "_")]
pub enum MessageMedia {
    #[serde(rename = "messageMediaDocument")]
    Document { document: Document },
    #[serde(rename = "messageMediaPhoto")]
    Photo,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: i64,
    pub access_hash: i64,
    #[serde(default)]
    pub file_reference: String,
    pub size: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub attributes: Vec<DocumentAttribute>,
}

impl Document {
    pub fn is_video(&self) -> bool {
        self.attributes
            .iter()
            .any(|attr| matches!(attr, DocumentAttribute::Video { .. }))
    }

    /// Last filename attribute wins when a document carries several.
    pub fn file_name(&self) -> Option<&str> {
        self.attributes
            .iter()
            .filter_map(|attr| match attr {
                DocumentAttribute::Filename { file_name } => Some(file_name.as_str()),
                _ => None,
            })
            .last()
    }

    pub fn remote_file(&self) -> RemoteFile {
        RemoteFile {
            remote_id: self.id,
            total_size: self.size,
            suggested_name: self
                .file_name()
                .map(str::to_string)
                .filter(|name| !name.trim().is_empty()),
            location: FileLocation {
                id: self.id,
                access_hash: self.access_hash,
                file_reference: self.file_reference.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "_")]
pub enum DocumentAttribute {
    #[serde(rename = "documentAttributeVideo")]
    Video {
        #[serde(default)]
        duration: f64,
        #[serde(default)]
        w: u32,
        #[serde(default)]
        h: u32,
        #[serde(default)]
        supports_streaming: bool,
    },
    #[serde(rename = "documentAttributeFilename")]
    Filename { file_name: String },
    #[serde(rename = "documentAttributeAudio")]
    Audio {
        #[serde(default)]
        duration: u32,
    },
    #[serde(rename = "documentAttributeAnimated")]
    Animated,
    #[serde(rename = "documentAttributeImageSize")]
    ImageSize { w: u32, h: u32 },
    #[serde(other)]
    Other,
}
