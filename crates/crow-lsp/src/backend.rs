//! LSP backend: document store, diagnostics, hover, and completion.

use std::collections::HashMap;
use std::sync::Arc;

use crow_iml::{Compiler, ImlError, MemberKind, ValueKind};
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::analysis::{Context, completion_context, enclosing_element, text_before, word_at};
use crate::knowledge::{
    STRUCTURAL, attributes_of, catalog, member_doc, member_in_type, pseudo_attributes, structural, type_by_name,
    type_doc,
};

// ── Backend ───────────────────────────────────────────────────────────────────

pub struct Backend {
    client: Client,
    docs: Arc<RwLock<HashMap<Url, String>>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self { client, docs: Arc::new(RwLock::new(HashMap::new())) }
    }

    async fn update(&self, uri: Url, text: String) {
        let diagnostics = compile_diagnostics(&text);
        self.client.publish_diagnostics(uri.clone(), diagnostics, None).await;
        self.docs.write().await.insert(uri, text);
    }
}

// ── LanguageServer impl ───────────────────────────────────────────────────────

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _params: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["<".to_string(), " ".to_string(), "\"".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "crow-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        let types = catalog().types().count();
        self.client.log_message(MessageType::INFO, format!("crow-lsp ready ({types} element types)")).await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    // ── Document lifecycle ────────────────────────────────────────────────────

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.update(params.text_document.uri, params.text_document.text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // FULL sync: the last change carries the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            self.update(params.text_document.uri, change.text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.docs.write().await.remove(&params.text_document.uri);
    }

    // ── Hover ─────────────────────────────────────────────────────────────────

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let pos = &params.text_document_position_params.position;

        let docs = self.docs.read().await;
        let Some(text) = docs.get(uri) else { return Ok(None) };
        let Some(word) = word_at(text, pos) else { return Ok(None) };

        // attribute of the tag under the cursor
        let before = text_before(text, pos);
        if let Some(element) = enclosing_element(&before) {
            if element != word {
                if let Some(member) = member_in_type(&element, word) {
                    return Ok(Some(markdown_hover(member_doc(&member))));
                }
                if let Some((name, doc)) = pseudo_attributes(&element).into_iter().find(|(n, _)| *n == word) {
                    return Ok(Some(markdown_hover(format!("**{name}**\n\n{doc}"))));
                }
            }
        }

        if let Some(ty) = type_by_name(word) {
            return Ok(Some(markdown_hover(type_doc(&ty))));
        }
        if let Some(s) = structural(word) {
            return Ok(Some(markdown_hover(format!("**{}**\n\n{}", s.name, s.doc))));
        }
        Ok(None)
    }

    // ── Completion ────────────────────────────────────────────────────────────

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let pos = &params.text_document_position.position;

        let docs = self.docs.read().await;
        let Some(text) = docs.get(uri) else { return Ok(None) };

        let items = match completion_context(text, pos) {
            Context::Element => element_items(),
            Context::Attribute { element } => attribute_items(&element),
            Context::Value { element, attribute } => value_items(&element, &attribute),
            Context::Unknown => vec![],
        };

        Ok(Some(CompletionResponse::Array(items)))
    }
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

fn compile_diagnostics(text: &str) -> Vec<Diagnostic> {
    match Compiler::new(catalog()).compile_str(text) {
        Ok(_) => vec![],
        Err(e) => vec![diagnostic(&e)],
    }
}

fn diagnostic(e: &ImlError) -> Diagnostic {
    // ImlError positions are 1-based; LSP positions are 0-based
    let at = e.position();
    let line = at.line.saturating_sub(1) as u32;
    let col = at.col.saturating_sub(1) as u32;
    Diagnostic {
        range: Range { start: Position::new(line, col), end: Position::new(line, col + 1) },
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("crow-lsp".to_string()),
        message: e.to_string(),
        ..Default::default()
    }
}

// ── Completion item builders ──────────────────────────────────────────────────

fn element_items() -> Vec<CompletionItem> {
    let types = catalog()
        .types()
        .map(|ty| {
            let detail = ty.doc.lines().next().unwrap_or("").to_string();
            let mut item = CompletionItem::new_simple(ty.name.clone(), detail);
            item.kind = Some(CompletionItemKind::CLASS);
            item
        })
        .collect::<Vec<_>>();
    let structural = STRUCTURAL.iter().map(|s| {
        let mut item = CompletionItem::new_simple(s.name.to_string(), s.doc.to_string());
        item.kind = Some(CompletionItemKind::KEYWORD);
        item
    });
    types.into_iter().chain(structural).collect()
}

fn attribute_items(element: &str) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = match type_by_name(element) {
        Some(ty) => attributes_of(&ty)
            .iter()
            .map(|m| {
                let detail = m.doc.lines().next().unwrap_or("").to_string();
                let mut item = CompletionItem::new_simple(m.name.clone(), detail);
                item.kind = Some(match m.kind {
                    MemberKind::Event { .. } => CompletionItemKind::EVENT,
                    _ => CompletionItemKind::PROPERTY,
                });
                item.insert_text = Some(format!("{}=\"$0\"", m.name));
                item.insert_text_format = Some(InsertTextFormat::SNIPPET);
                item
            })
            .collect(),
        None => vec![],
    };
    items.extend(pseudo_attributes(element).into_iter().map(|(name, doc)| {
        let mut item = CompletionItem::new_simple(name.to_string(), doc.to_string());
        item.kind = Some(CompletionItemKind::KEYWORD);
        item.insert_text = Some(format!("{name}=\"$0\""));
        item.insert_text_format = Some(InsertTextFormat::SNIPPET);
        item
    }));
    items
}

fn value_items(element: &str, attribute: &str) -> Vec<CompletionItem> {
    let Some(member) = member_in_type(element, attribute) else { return vec![] };

    match member.value_kind() {
        Some(ValueKind::Enum(variants)) => variants
            .iter()
            .map(|v| {
                let mut item = CompletionItem::new_simple(v.to_string(), String::new());
                item.kind = Some(CompletionItemKind::ENUM_MEMBER);
                item
            })
            .collect(),

        Some(ValueKind::Bool) => vec![simple_item("true", "bool"), simple_item("false", "bool")],

        Some(ValueKind::Color) => vec![{
            let mut item = CompletionItem::new_simple(
                "#rrggbbaa".to_string(),
                "Color literal (straight alpha, 6 or 8 hex digits)".to_string(),
            );
            item.kind = Some(CompletionItemKind::COLOR);
            item.insert_text = Some("#$0".to_string());
            item.insert_text_format = Some(InsertTextFormat::SNIPPET);
            item
        }],

        _ => vec![],
    }
}

fn simple_item(label: &str, detail: &str) -> CompletionItem {
    let mut item = CompletionItem::new_simple(label.to_string(), detail.to_string());
    item.kind = Some(CompletionItemKind::VALUE);
    item
}

// ── Misc helpers ──────────────────────────────────────────────────────────────

fn markdown_hover(md: String) -> Hover {
    Hover { contents: HoverContents::Markup(MarkupContent { kind: MarkupKind::Markdown, value: md }), range: None }
}
