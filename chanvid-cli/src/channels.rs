use crate::retry::retry;
use crate::rpc::{DIALOGS_LIMIT, RpcClient};
use anyhow::{Result, bail};
use chanvid::ChannelHandle;
use chanvid::model::DialogsPage;
use std::io::{self, BufRead, Write};
use tabled::{Table, Tabled, settings::Style};
use tracing::{debug, warn};

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Username")]
    username: String,
}

pub fn fetch_channels(client: &RpcClient, retries: usize) -> Result<Vec<ChannelHandle>> {
    let page = retry("fetch dialogs", retries, || {
        Ok(client.get_dialogs(DIALOGS_LIMIT)?)
    })?;
    let chats = match page {
        DialogsPage::Dialogs { chats } | DialogsPage::DialogsSlice { chats, .. } => chats,
        DialogsPage::NotModified { .. } => bail!("dialogs not modified"),
    };
    let channels: Vec<ChannelHandle> = chats.into_iter().filter_map(|chat| chat.into_handle()).collect();
    debug!(count = channels.len(), "joined channels");
    Ok(channels)
}

pub fn print_channels(channels: &[ChannelHandle]) {
    if channels.is_empty() {
        println!("(no joined channels)");
        return;
    }
    let rows: Vec<ChannelRow> = channels
        .iter()
        .enumerate()
        .map(|(idx, channel)| ChannelRow {
            index: idx + 1,
            id: channel.id,
            title: channel.title.clone(),
            username: channel
                .username
                .as_deref()
                .filter(|name| !name.is_empty())
                .map(|name| format!("@{name}"))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Matches a numeric id or a username, with or without the leading `@`.
pub fn find_channel<'a>(channels: &'a [ChannelHandle], query: &str) -> Option<&'a ChannelHandle> {
    let query = query.trim();
    if let Ok(id) = query.parse::<i64>() {
        return channels.iter().find(|channel| channel.id == id);
    }
    let name = query.trim_start_matches('@');
    channels.iter().find(|channel| {
        channel
            .username
            .as_deref()
            .is_some_and(|username| username.eq_ignore_ascii_case(name))
    })
}

pub fn select_channel(channels: &[ChannelHandle]) -> Result<Option<ChannelHandle>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    select_channel_from(channels, &mut input, &mut output)
}

/// Numbered menu; anything other than a listed number selects nothing.
pub fn select_channel_from<R: BufRead, W: Write>(
    channels: &[ChannelHandle],
    input: &mut R,
    output: &mut W,
) -> Result<Option<ChannelHandle>> {
    for (idx, channel) in channels.iter().enumerate() {
        writeln!(output, "{:>3}. {}", idx + 1, channel.display_name())?;
    }
    write!(output, "Select a channel [1-{}]: ", channels.len())?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let choice = line.trim();
    match choice.parse::<usize>() {
        Ok(index) if (1..=channels.len()).contains(&index) => Ok(Some(channels[index - 1].clone())),
        _ => {
            warn!(choice, "invalid selection");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use std::io::Cursor;

    fn channels() -> Vec<ChannelHandle> {
        vec![
            ChannelHandle {
                id: 1001,
                access_hash: 1,
                title: "Lectures".into(),
                username: Some("lectures".into()),
            },
            ChannelHandle {
                id: 1002,
                access_hash: 2,
                title: "Family".into(),
                username: None,
            },
        ]
    }

    #[test]
    fn channels_are_found_by_id_or_username() {
        let list = channels();
        assert_eq!(find_channel(&list, "1002").unwrap().title, "Family");
        assert_eq!(find_channel(&list, "@Lectures").unwrap().id, 1001);
        assert_eq!(find_channel(&list, "lectures").unwrap().id, 1001);
        assert!(find_channel(&list, "@missing").is_none());
    }

    #[test]
    fn menu_selection_is_one_based() {
        let list = channels();
        let mut output = Vec::new();
        let picked = select_channel_from(&list, &mut Cursor::new("2\n"), &mut output).unwrap();
        assert_eq!(picked.unwrap().id, 1002);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("  1. Lectures (@lectures)"));
        assert!(shown.contains("Select a channel [1-2]: "));

        for bad in ["0\n", "3\n", "abc\n", ""] {
            let picked = select_channel_from(&list, &mut Cursor::new(bad), &mut Vec::new()).unwrap();
            assert!(picked.is_none(), "input {bad:?}");
        }
    }

    #[test]
    fn dialogs_keep_only_joined_chats() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/messages.getDialogs")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok":true,"result":{"_":"messages.dialogsSlice","count":3,"chats":[
                    {"_":"channel","id":1,"access_hash":11,"title":"Kept","username":"kept"},
                    {"_":"channel","id":2,"access_hash":22,"title":"Left","left":true},
                    {"_":"channelForbidden","id":3}]}}"#,
            )
            .create();
        let client = RpcClient::new(
            &server.url(),
            Credentials {
                api_id: 1,
                api_hash: "h".into(),
                session_token: None,
            },
        )
        .unwrap();

        let list = fetch_channels(&client, 1).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].display_name(), "Kept (@kept)");
    }
}
