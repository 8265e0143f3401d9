//! One handler module per namespace. Every handler takes the explicit
//! [`ParseContext`], the route being built and the expression, and only
//! returns an error for collaborator failures; bad input becomes a diagnostic.

pub mod cycle;
pub mod options;
pub mod route;
pub mod signal;
pub mod structure;
pub mod track;
pub mod train;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location};
use crate::dsl::lexer::Expression;
use crate::error::RouteError;
use crate::loader::{
    LoadResult, ObjectHandle, ResourceLoader, SoundHandle, TextureHandle, TextureParams,
};
use crate::model::StructureKind;
use crate::paths;
use crate::settings::RouteSettings;

/// Radius within which positional sounds are audible, metres.
pub const SOUND_RADIUS: f64 = 15.0;

/// State threaded through every handler call for one load.
pub struct ParseContext<'a> {
    pub loader: &'a dyn ResourceLoader,
    sink: &'a mut dyn DiagnosticSink,
    pub settings: &'a RouteSettings,
    pub route_folder: PathBuf,
    /// Current track position, metres.
    pub position: f64,
    reported_unsupported: HashSet<String>,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        loader: &'a dyn ResourceLoader,
        sink: &'a mut dyn DiagnosticSink,
        settings: &'a RouteSettings,
        route_folder: &Path,
    ) -> Self {
        Self {
            loader,
            sink,
            settings,
            route_folder: route_folder.to_path_buf(),
            position: 0.0,
            reported_unsupported: HashSet::new(),
        }
    }

    pub fn preview_only(&self) -> bool {
        self.settings.preview_only
    }

    pub fn object_folder(&self) -> PathBuf {
        self.settings.object_folder(&self.route_folder).to_path_buf()
    }

    pub fn sound_folder(&self) -> PathBuf {
        self.settings.sound_folder(&self.route_folder).to_path_buf()
    }

    // ── Diagnostics ──────────────────────────────────────────────

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.sink.emit(diagnostic);
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, at: &Location) {
        self.sink.emit(Diagnostic::error(kind, message, at.clone()));
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>, at: &Location) {
        self.sink.emit(Diagnostic::warning(kind, message, at.clone()));
    }

    pub fn missing(&mut self, message: impl Into<String>, at: &Location) {
        self.sink.emit(Diagnostic::missing(message, at.clone()));
    }

    /// Report an unknown command, once per distinct `Namespace.Command`.
    pub fn unsupported(&mut self, expr: &Expression) {
        let key = format!("{}.{}", expr.namespace, expr.command).to_ascii_lowercase();
        if self.reported_unsupported.insert(key) {
            let message = format!("{}.{} is not supported", expr.namespace, expr.command);
            self.error(DiagnosticKind::UnsupportedCommand, message, &expr.location);
        }
    }

    // ── Collaborator calls ───────────────────────────────────────

    /// Turn a loader result into the interpreter's policy: missing resources
    /// are critical diagnostics, collaborator failures abort a full load and
    /// are downgraded to diagnostics in preview mode.
    fn settle<T>(&mut self, result: LoadResult<T>, path: &Path, at: &Location) -> Result<Option<T>, RouteError> {
        match result {
            Ok(Some(handle)) => Ok(Some(handle)),
            Ok(None) => {
                self.missing(format!("{} could not be loaded", path.display()), at);
                Ok(None)
            }
            Err(e) if self.preview_only() => {
                self.missing(format!("Loader failure ignored in preview: {e}"), at);
                Ok(None)
            }
            Err(e) => Err(RouteError::Loader(e)),
        }
    }

    /// Resolve and load a structure object. Deformable kinds keep their vertices.
    pub fn load_structure(
        &mut self,
        reference: &str,
        kind: StructureKind,
        at: &Location,
    ) -> Result<Option<ObjectHandle>, RouteError> {
        let folder = self.object_folder();
        let folders = [folder.as_path(), self.route_folder.as_path()];
        let Some(path) = paths::resolve_object(self.loader, &folders, reference) else {
            self.missing(format!("{} object {reference} was not found", kind.label()), at);
            return Ok(None);
        };
        let encoding = self.settings.encoding;
        let result = if kind.is_deformable() {
            self.loader.load_static_object(&path, encoding, true)
        } else {
            self.loader.load_object(&path, encoding)
        };
        self.settle(result, &path, at)
    }

    /// Resolve and load an object that may animate (signals).
    pub fn load_object(&mut self, reference: &str, at: &Location) -> Result<Option<ObjectHandle>, RouteError> {
        let folder = self.object_folder();
        let folders = [folder.as_path(), self.route_folder.as_path()];
        let Some(path) = paths::resolve_object(self.loader, &folders, reference) else {
            self.missing(format!("Object {reference} was not found"), at);
            return Ok(None);
        };
        let result = self.loader.load_object(&path, self.settings.encoding);
        self.settle(result, &path, at)
    }

    pub fn load_static_object(
        &mut self,
        reference: &str,
        at: &Location,
    ) -> Result<Option<ObjectHandle>, RouteError> {
        let folder = self.object_folder();
        let folders = [folder.as_path(), self.route_folder.as_path()];
        let Some(path) = paths::resolve_object(self.loader, &folders, reference) else {
            self.missing(format!("Object {reference} was not found"), at);
            return Ok(None);
        };
        let result = self
            .loader
            .load_static_object(&path, self.settings.encoding, false);
        self.settle(result, &path, at)
    }

    pub fn register_texture(
        &mut self,
        folder: &Path,
        reference: &str,
        params: &TextureParams,
        at: &Location,
    ) -> Result<Option<TextureHandle>, RouteError> {
        let Some(path) = paths::resolve_file(self.loader, &[folder], reference) else {
            self.missing(format!("Texture {reference} was not found"), at);
            return Ok(None);
        };
        let result = self.loader.register_texture(&path, params);
        self.settle(result, &path, at)
    }

    pub fn register_sound(&mut self, reference: &str, at: &Location) -> Result<Option<SoundHandle>, RouteError> {
        let folder = self.sound_folder();
        let folders = [folder.as_path(), self.route_folder.as_path()];
        let Some(path) = paths::resolve_file(self.loader, &folders, reference) else {
            self.missing(format!("Sound {reference} was not found"), at);
            return Ok(None);
        };
        let result = self.loader.register_sound(&path, SOUND_RADIUS);
        self.settle(result, &path, at)
    }

    /// Read a text resource (XML) relative to the object folder.
    /// Returns the text and the folder it was found in.
    pub fn read_resource(
        &mut self,
        reference: &str,
        at: &Location,
    ) -> Result<Option<(String, PathBuf)>, RouteError> {
        let folder = self.object_folder();
        let folders = [folder.as_path(), self.route_folder.as_path()];
        let Some(path) = paths::resolve_file(self.loader, &folders, reference) else {
            self.missing(format!("File {reference} was not found"), at);
            return Ok(None);
        };
        match self.loader.read_text(&path, self.settings.encoding) {
            Ok(text) => {
                let parent = path.parent().map_or_else(|| folder.clone(), Path::to_path_buf);
                Ok(Some((text, parent)))
            }
            Err(e) if self.preview_only() => {
                self.missing(format!("Loader failure ignored in preview: {e}"), at);
                Ok(None)
            }
            Err(e) => Err(RouteError::Loader(e)),
        }
    }
}
