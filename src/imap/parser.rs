//-
// Copyright (c) 2025, Ketch Developers
//
// This file is part of Ketch.
//
// Ketch is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Ketch is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Ketch. If not, see <http://www.gnu.org/licenses/>.

//! Recursive descent over the IMAP command grammar.
//!
//! [`Parser::next`] reads one command per call: it advances to a fresh line,
//! reads the tag and the command keyword, and dispatches on the lowercased
//! keyword through the injected [`CommandRegistry`]. Unrecognised keywords
//! produce [`Command::Unknown`]; anything the grammar rejects outright is an
//! [`Error::Parse`], which the connection loop turns into a fatal `BYE`.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncRead, BufReader};

use super::command::{
    Command, FetchAtt, FetchPartial, FetchSection, SequenceRange, UidCommand,
    SEQUENCE_WILDCARD,
};
use super::lexer::{FetchAttKind, FetchMacro, Lexer, PartSpecifier};
use super::line_reader::LineReader;
use crate::support::error::Error;

/// The command kinds the parser knows how to read arguments for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Noop,
    Capability,
    StartTls,
    Login,
    Logout,
    Authenticate,
    Select,
    Examine,
    Create,
    Delete,
    Rename,
    Subscribe,
    Unsubscribe,
    List,
    Lsub,
    Status,
    Check,
    Fetch,
    Uid,
}

/// The name-to-command map used for dispatch.
///
/// Populated once before the server starts accepting; read-only while
/// serving.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandKind>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry::default()
    }

    /// The full RFC 3501 command set Ketch implements.
    pub fn standard() -> Self {
        let mut registry = CommandRegistry::new();
        registry.register("noop", CommandKind::Noop);
        registry.register("capability", CommandKind::Capability);
        registry.register("starttls", CommandKind::StartTls);
        registry.register("login", CommandKind::Login);
        registry.register("logout", CommandKind::Logout);
        registry.register("authenticate", CommandKind::Authenticate);
        registry.register("select", CommandKind::Select);
        registry.register("examine", CommandKind::Examine);
        registry.register("create", CommandKind::Create);
        registry.register("delete", CommandKind::Delete);
        registry.register("rename", CommandKind::Rename);
        registry.register("subscribe", CommandKind::Subscribe);
        registry.register("unsubscribe", CommandKind::Unsubscribe);
        registry.register("list", CommandKind::List);
        registry.register("lsub", CommandKind::Lsub);
        registry.register("status", CommandKind::Status);
        registry.register("check", CommandKind::Check);
        registry.register("fetch", CommandKind::Fetch);
        registry.register("uid", CommandKind::Uid);
        registry
    }

    pub fn register(&mut self, name: &str, kind: CommandKind) {
        self.commands.insert(name.to_lowercase(), kind);
    }

    pub fn lookup(&self, name: &str) -> Option<CommandKind> {
        self.commands.get(name).copied()
    }
}

pub struct Parser<R> {
    lexer: Lexer<R>,
    registry: Arc<CommandRegistry>,
}

impl<R: AsyncRead + Unpin> Parser<R> {
    pub fn new(io: R, registry: Arc<CommandRegistry>) -> Self {
        Parser {
            lexer: Lexer::new(LineReader::new(io)),
            registry,
        }
    }

    /// The underlying buffered stream, for writing responses.
    pub fn stream(&mut self) -> &mut BufReader<R> {
        self.lexer.reader().io()
    }

    /// Swap the underlying stream (the STARTTLS upgrade), returning the old
    /// one. Any buffered plaintext input is discarded.
    pub fn replace_stream(&mut self, io: R) -> R {
        self.lexer.reader().replace_io(io)
    }

    /// Read the next command.
    pub async fn next(&mut self) -> Result<Command, Error> {
        // All commands start on a new line
        self.lexer.new_line().await?;

        // Expect a tag followed by a command keyword
        let tag = self.expect_tag()?;
        let raw_name = self.expect_astring().await?;

        // Dispatch on the lowercase name so typing over telnet is easier
        let name = raw_name.to_lowercase();
        debug!("Processing {} {}", tag, name);

        match self.registry.lookup(&name) {
            Some(kind) => self.parse_arguments(kind, tag).await,
            None => Ok(Command::Unknown {
                tag,
                name: raw_name,
            }),
        }
    }

    async fn parse_arguments(
        &mut self,
        kind: CommandKind,
        tag: String,
    ) -> Result<Command, Error> {
        Ok(match kind {
            CommandKind::Noop => Command::Noop { tag },
            CommandKind::Capability => Command::Capability { tag },
            CommandKind::StartTls => Command::StartTls { tag },
            CommandKind::Logout => Command::Logout { tag },
            CommandKind::Check => Command::Check { tag },

            CommandKind::Login => {
                let user = self.expect_astring().await?;
                let password = self.expect_astring().await?;
                Command::Login {
                    tag,
                    user,
                    password,
                }
            }

            CommandKind::Authenticate => {
                let mechanism = self.expect_astring().await?.to_lowercase();
                Command::Authenticate { tag, mechanism }
            }

            CommandKind::Select => Command::Select {
                tag,
                mailbox: self.expect_astring().await?,
            },
            CommandKind::Examine => Command::Examine {
                tag,
                mailbox: self.expect_astring().await?,
            },
            CommandKind::Create => Command::Create {
                tag,
                mailbox: self.expect_astring().await?,
            },
            CommandKind::Delete => Command::Delete {
                tag,
                mailbox: self.expect_astring().await?,
            },
            CommandKind::Status => Command::Status {
                tag,
                mailbox: self.expect_astring().await?,
            },
            CommandKind::Subscribe => Command::Subscribe {
                tag,
                mailbox: self.expect_astring().await?,
            },
            CommandKind::Unsubscribe => Command::Unsubscribe {
                tag,
                mailbox: self.expect_astring().await?,
            },

            CommandKind::Rename => {
                let old_name = self.expect_astring().await?;
                let new_name = self.expect_astring().await?;
                Command::Rename {
                    tag,
                    old_name,
                    new_name,
                }
            }

            CommandKind::List => {
                let (reference, pattern) = self.list_arguments().await?;
                Command::List {
                    tag,
                    reference,
                    pattern,
                }
            }
            CommandKind::Lsub => {
                let (reference, pattern) = self.list_arguments().await?;
                Command::Lsub {
                    tag,
                    reference,
                    pattern,
                }
            }

            CommandKind::Fetch => {
                let (set, macro_, atts) = self.fetch_arguments().await?;
                Command::Fetch {
                    tag,
                    set,
                    macro_,
                    atts,
                }
            }

            CommandKind::Uid => {
                let sub = self.expect_astring().await?.to_lowercase();
                let sub = match sub.as_str() {
                    "fetch" => {
                        let (set, macro_, atts) =
                            self.fetch_arguments().await?;
                        UidCommand::Fetch { set, macro_, atts }
                    }
                    "copy" | "store" | "search" => {
                        UidCommand::NotImplemented(sub)
                    }
                    _ => UidCommand::Unknown(sub),
                };
                Command::Uid { tag, sub }
            }
        })
    }

    async fn list_arguments(&mut self) -> Result<(String, String), Error> {
        let mut reference = self.expect_astring().await?;
        if reference.eq_ignore_ascii_case("inbox") {
            reference = "INBOX".to_owned();
        }
        let pattern = self
            .lexer
            .list_mailbox()
            .await?
            .ok_or_else(|| self.unexpected())?;
        Ok((reference, pattern))
    }

    async fn fetch_arguments(
        &mut self,
    ) -> Result<(Vec<SequenceRange>, Option<FetchMacro>, Vec<FetchAtt>), Error>
    {
        // The first argument is always a sequence set
        self.lexer.skip_space()?;
        let set = self.expect_sequence_set()?;

        // The next token is a macro, a fetch attachment, or an open paren
        let macro_ = self.lexer.fetch_macro()?;
        let atts = if macro_.is_some() {
            Vec::new()
        } else {
            let multiple = self.lexer.left_paren()?;
            self.expect_fetch_attachments(multiple).await?
        };

        Ok((set, macro_, atts))
    }

    //----- Helper productions ------------------------------------------------

    fn unexpected(&self) -> Error {
        Error::Parse(format!(
            "Parser unexpected {:?}",
            self.lexer.current() as char
        ))
    }

    fn expect_tag(&mut self) -> Result<String, Error> {
        self.lexer.tag()?.ok_or_else(|| self.unexpected())
    }

    async fn expect_astring(&mut self) -> Result<String, Error> {
        match self.lexer.astring().await? {
            Some(value) => Ok(value),
            None => Err(self.unexpected()),
        }
    }

    /// sequence-set = (seq-number | seq-range) ("," sequence-set)*
    fn expect_sequence_set(&mut self) -> Result<Vec<SequenceRange>, Error> {
        let mut ret = Vec::with_capacity(4);

        loop {
            let start = self.expect_sequence_number()?;
            let mut item = SequenceRange::single(start);

            if self.lexer.sequence_range_separator()? {
                item.end = Some(self.expect_sequence_number()?);
            }
            ret.push(item);

            if !self.lexer.sequence_delimiter()? {
                break;
            }
        }

        Ok(ret)
    }

    /// seq-number = nz-number | "*"
    fn expect_sequence_number(&mut self) -> Result<u32, Error> {
        if let Some(n) = self.lexer.non_zero_number()? {
            return Ok(n);
        }
        if self.lexer.sequence_wildcard()? {
            return Ok(SEQUENCE_WILDCARD);
        }
        Err(self.unexpected())
    }

    /// fetch-att | "(" fetch-att (SP fetch-att)* ")"
    async fn expect_fetch_attachments(
        &mut self,
        multiple: bool,
    ) -> Result<Vec<FetchAtt>, Error> {
        let mut ret = Vec::with_capacity(4);

        loop {
            if multiple && self.lexer.right_paren()? {
                return Ok(ret);
            }

            let kind = self
                .lexer
                .fetch_att_keyword()?
                .ok_or_else(|| Error::parse("Expected fetch attachment"))?;

            match kind {
                FetchAttKind::Body => {
                    // Optional section argument; without one this is the
                    // BODYSTRUCTURE-without-extensions attachment
                    if let Some(mut section) = self.section().await? {
                        section.partial = self.optional_fetch_partial()?;
                        ret.push(FetchAtt::BodySection {
                            section,
                            peek: false,
                        });
                    } else {
                        ret.push(FetchAtt::Body);
                    }
                }
                FetchAttKind::BodyPeek => {
                    // Mandatory section argument
                    let mut section = self.section().await?.ok_or_else(|| {
                        Error::parse("BODY.PEEK must be followed by section")
                    })?;
                    section.partial = self.optional_fetch_partial()?;
                    ret.push(FetchAtt::BodySection {
                        section,
                        peek: true,
                    });
                }
                FetchAttKind::Envelope => ret.push(FetchAtt::Envelope),
                FetchAttKind::Flags => ret.push(FetchAtt::Flags),
                FetchAttKind::InternalDate => {
                    ret.push(FetchAtt::InternalDate)
                }
                FetchAttKind::Rfc822Header => {
                    ret.push(FetchAtt::Rfc822Header)
                }
                FetchAttKind::Rfc822Size => ret.push(FetchAtt::Rfc822Size),
                FetchAttKind::Rfc822Text => ret.push(FetchAtt::Rfc822Text),
                FetchAttKind::BodyStructure => {
                    ret.push(FetchAtt::BodyStructure)
                }
                FetchAttKind::Uid => ret.push(FetchAtt::Uid),
            }

            if !multiple {
                return Ok(ret);
            }
        }
    }

    /// section = "[" [section-spec] "]"
    async fn section(&mut self) -> Result<Option<FetchSection>, Error> {
        if !self.lexer.left_bracket()? {
            return Ok(None);
        }

        let mut section = FetchSection::default();

        if !self.section_msgtext(&mut section).await?
            && self.lexer.current() != b']'
        {
            // This must be a section part
            section.part = self.expect_section_part()?;

            // Followed by an optional "." and section text
            if self.lexer.dot()? {
                self.expect_section_text(&mut section).await?;
            }
        }

        if !self.lexer.right_bracket()? {
            return Err(Error::parse("Expected section to end with ']'"));
        }

        Ok(Some(section))
    }

    /// section-msgtext = "HEADER" | "HEADER.FIELDS" [".NOT"] SP header-list
    ///                 | "TEXT"
    async fn section_msgtext(
        &mut self,
        section: &mut FetchSection,
    ) -> Result<bool, Error> {
        let specifier = match self.lexer.part_specifier()? {
            Some(specifier) => specifier,
            None => return Ok(false),
        };

        // The FIELDS variants carry a header-list argument
        if matches!(
            specifier,
            PartSpecifier::HeaderFields | PartSpecifier::HeaderFieldsNot
        ) {
            self.lexer.skip_space()?;
            section.fields = self.expect_header_list().await?;
        }

        section.specifier = specifier;
        Ok(true)
    }

    /// section-part = nz-number ("." nz-number)*
    fn expect_section_part(&mut self) -> Result<Vec<u32>, Error> {
        let mut ret = Vec::with_capacity(4);

        loop {
            match self.lexer.non_zero_number()? {
                Some(n) => ret.push(n),
                None => {
                    if ret.is_empty() {
                        return Err(Error::parse(
                            "Expected a non-zero number in section-part",
                        ));
                    }
                    // This is the start of the section text; move back onto
                    // the "." so the caller sees it
                    self.lexer.push_back_token();
                    self.lexer.push_back();
                    return Ok(ret);
                }
            }

            if !self.lexer.dot()? {
                return Ok(ret);
            }
        }
    }

    /// section-text = section-msgtext | "MIME"
    async fn expect_section_text(
        &mut self,
        section: &mut FetchSection,
    ) -> Result<(), Error> {
        if self.section_msgtext(section).await? {
            return Ok(());
        }

        if !self.lexer.mime()? {
            return Err(Error::parse("Expected section-msgtext or MIME"));
        }

        section.specifier = PartSpecifier::Mime;
        Ok(())
    }

    /// "<" number "." nz-number ">", only valid after a section
    fn optional_fetch_partial(
        &mut self,
    ) -> Result<Option<FetchPartial>, Error> {
        if !self.lexer.less_than()? {
            return Ok(None);
        }

        let from = self
            .lexer
            .number()?
            .ok_or_else(|| Error::parse("Expected number in fetch partial"))?;

        if !self.lexer.dot()? {
            return Err(Error::parse("Expected '.' in fetch partial"));
        }

        let length = self.lexer.non_zero_number()?.ok_or_else(|| {
            Error::parse("Expected non-zero number in fetch partial")
        })?;

        if !self.lexer.greater_than()? {
            return Err(Error::parse("Fetch partial should end with '>'"));
        }

        Ok(Some(FetchPartial { from, length }))
    }

    /// header-list = "(" astring (SP astring)* ")"
    async fn expect_header_list(&mut self) -> Result<Vec<String>, Error> {
        if !self.lexer.left_paren()? {
            return Err(Error::parse(
                "Expected open paren at start of header-list",
            ));
        }

        let mut ret = Vec::with_capacity(4);
        loop {
            ret.push(self.expect_astring().await?);
            if self.lexer.right_paren()? {
                return Ok(ret);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn parse_one(input: &'static str) -> Command {
        parser(input).next().await.unwrap()
    }

    fn parser(input: &'static str) -> Parser<&'static [u8]> {
        Parser::new(
            input.as_bytes(),
            Arc::new(CommandRegistry::standard()),
        )
    }

    #[tokio::test]
    async fn parses_simple_commands() {
        assert_eq!(
            Command::Capability {
                tag: "a1".to_owned()
            },
            parse_one("a1 CAPABILITY\r\n").await
        );
        assert_eq!(
            Command::Noop {
                tag: "a2".to_owned()
            },
            parse_one("a2 noop\r\n").await
        );
        assert_eq!(
            Command::Logout {
                tag: "xyz.3".to_owned()
            },
            parse_one("xyz.3 LoGoUt\r\n").await
        );
    }

    #[tokio::test]
    async fn unknown_keyword_preserves_original_spelling() {
        assert_eq!(
            Command::Unknown {
                tag: "a1".to_owned(),
                name: "FROBNICATE".to_owned()
            },
            parse_one("a1 FROBNICATE weird args\r\n").await
        );
    }

    #[tokio::test]
    async fn login_accepts_literal_arguments() {
        // Scenario: both credentials delivered as literals across lines
        assert_eq!(
            Command::Login {
                tag: "a1".to_owned(),
                user: "test".to_owned(),
                password: "password".to_owned()
            },
            parse_one("a1 LOGIN {4}\r\ntest {8}\r\npassword\r\n").await
        );
    }

    #[tokio::test]
    async fn login_accepts_quoted_arguments() {
        assert_eq!(
            Command::Login {
                tag: "a1".to_owned(),
                user: "us er".to_owned(),
                password: "pa\"ss".to_owned()
            },
            parse_one("a1 LOGIN \"us er\" \"pa\\\"ss\"\r\n").await
        );
    }

    #[tokio::test]
    async fn list_arguments_canonicalise_inbox_reference() {
        assert_eq!(
            Command::List {
                tag: "a1".to_owned(),
                reference: "INBOX".to_owned(),
                pattern: "%".to_owned()
            },
            parse_one("a1 LIST inbox %\r\n").await
        );
        assert_eq!(
            Command::List {
                tag: "a1".to_owned(),
                reference: String::new(),
                pattern: String::new()
            },
            parse_one("a1 LIST \"\" \"\"\r\n").await
        );
    }

    #[tokio::test]
    async fn sequence_sets() {
        let command =
            parse_one("a1 FETCH 1,3:5,7:*,* FLAGS\r\n").await;
        match command {
            Command::Fetch { set, .. } => assert_eq!(
                vec![
                    SequenceRange::single(1),
                    SequenceRange::range(3, 5),
                    SequenceRange::range(7, SEQUENCE_WILDCARD),
                    SequenceRange::single(SEQUENCE_WILDCARD),
                ],
                set
            ),
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_is_not_a_sequence_number() {
        let mut parser = parser("a1 FETCH 0 FLAGS\r\n");
        assert!(matches!(parser.next().await, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn fetch_attachment_lists() {
        match parse_one("a1 FETCH 1:* (UID FLAGS)\r\n").await {
            Command::Fetch {
                set, macro_, atts, ..
            } => {
                assert_eq!(
                    vec![SequenceRange::range(1, SEQUENCE_WILDCARD)],
                    set
                );
                assert_eq!(None, macro_);
                assert_eq!(vec![FetchAtt::Uid, FetchAtt::Flags], atts);
            }
            other => panic!("Unexpected command: {:?}", other),
        }

        match parse_one("a1 FETCH 2 RFC822.SIZE\r\n").await {
            Command::Fetch { atts, .. } => {
                assert_eq!(vec![FetchAtt::Rfc822Size], atts)
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_macros() {
        match parse_one("a1 FETCH 1:2 full\r\n").await {
            Command::Fetch { macro_, atts, .. } => {
                assert_eq!(Some(FetchMacro::Full), macro_);
                assert!(atts.is_empty());
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn body_without_section_is_structure() {
        match parse_one("a1 FETCH 1 BODY\r\n").await {
            Command::Fetch { atts, .. } => {
                assert_eq!(vec![FetchAtt::Body], atts)
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn body_sections() {
        match parse_one(
            "a1 FETCH 1 (BODY[] BODY[HEADER] BODY[1.2.TEXT] BODY[1.2])\r\n",
        )
        .await
        {
            Command::Fetch { atts, .. } => {
                assert_eq!(
                    vec![
                        FetchAtt::BodySection {
                            section: FetchSection::default(),
                            peek: false
                        },
                        FetchAtt::BodySection {
                            section: FetchSection {
                                specifier: PartSpecifier::Header,
                                ..FetchSection::default()
                            },
                            peek: false
                        },
                        FetchAtt::BodySection {
                            section: FetchSection {
                                part: vec![1, 2],
                                specifier: PartSpecifier::Text,
                                ..FetchSection::default()
                            },
                            peek: false
                        },
                        FetchAtt::BodySection {
                            section: FetchSection {
                                part: vec![1, 2],
                                ..FetchSection::default()
                            },
                            peek: false
                        },
                    ],
                    atts
                );
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn body_peek_with_header_fields_and_partial() {
        match parse_one(
            "a1 FETCH 1 BODY.PEEK[HEADER.FIELDS (From To)]<0.100>\r\n",
        )
        .await
        {
            Command::Fetch { atts, .. } => {
                assert_eq!(
                    vec![FetchAtt::BodySection {
                        section: FetchSection {
                            part: vec![],
                            specifier: PartSpecifier::HeaderFields,
                            fields: vec!["From".to_owned(), "To".to_owned()],
                            partial: Some(FetchPartial {
                                from: 0,
                                length: 100
                            }),
                        },
                        peek: true
                    }],
                    atts
                );
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn body_peek_requires_section() {
        let mut parser = parser("a1 FETCH 1 BODY.PEEK\r\n");
        assert!(matches!(parser.next().await, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn mime_section_text() {
        match parse_one("a1 FETCH 1 BODY[2.MIME]\r\n").await {
            Command::Fetch { atts, .. } => {
                assert_eq!(
                    vec![FetchAtt::BodySection {
                        section: FetchSection {
                            part: vec![2],
                            specifier: PartSpecifier::Mime,
                            ..FetchSection::default()
                        },
                        peek: false
                    }],
                    atts
                );
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn uid_subcommands() {
        match parse_one("a1 UID FETCH 1:* FLAGS\r\n").await {
            Command::Uid {
                sub: UidCommand::Fetch { set, atts, .. },
                ..
            } => {
                assert_eq!(
                    vec![SequenceRange::range(1, SEQUENCE_WILDCARD)],
                    set
                );
                assert_eq!(vec![FetchAtt::Flags], atts);
            }
            other => panic!("Unexpected command: {:?}", other),
        }

        assert_eq!(
            Command::Uid {
                tag: "a2".to_owned(),
                sub: UidCommand::NotImplemented("search".to_owned())
            },
            parse_one("a2 UID SEARCH ALL\r\n").await
        );
        assert_eq!(
            Command::Uid {
                tag: "a3".to_owned(),
                sub: UidCommand::Unknown("frob".to_owned())
            },
            parse_one("a3 UID FROB 1\r\n").await
        );
    }

    #[tokio::test]
    async fn rename_takes_two_names() {
        assert_eq!(
            Command::Rename {
                tag: "a1".to_owned(),
                old_name: "old/sub".to_owned(),
                new_name: "new".to_owned()
            },
            parse_one("a1 RENAME old/sub new\r\n").await
        );
    }

    #[tokio::test]
    async fn missing_arguments_are_parse_errors() {
        let mut p = parser("a1 LOGIN\r\n");
        assert!(matches!(p.next().await, Err(Error::Parse(_))));

        let mut p = parser("a1 SELECT\r\n");
        assert!(matches!(p.next().await, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn commands_start_on_fresh_lines() {
        let mut p = parser("a1 NOOP trailing garbage\r\na2 CHECK\r\n");
        assert_eq!(
            Command::Noop {
                tag: "a1".to_owned()
            },
            p.next().await.unwrap()
        );
        assert_eq!(
            Command::Check {
                tag: "a2".to_owned()
            },
            p.next().await.unwrap()
        );
        assert!(matches!(p.next().await, Err(Error::Disconnected)));
    }

    #[tokio::test]
    async fn select_accepts_quoted_mailbox() {
        assert_eq!(
            Command::Select {
                tag: "a1".to_owned(),
                mailbox: "INBOX".to_owned()
            },
            parse_one("a1 SELECT \"INBOX\"\r\n").await
        );
    }
}
