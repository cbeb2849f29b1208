//! Manifest serializers.
//!
//! Three encodings of the same [`Catalog`], all traversing packages, versions
//! and architectures in catalog order:
//!
//! - a Lua table in the layout LuaRocks expects from `manifest` files
//! - JSON (`[{"Name": ..., "Versions": [{"Name": ..., "Arch": [...]}]}]`)
//! - a zip archive with a single entry holding the Lua table

use crate::catalog::Catalog;
use crate::error::Result;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Content type of the Lua manifest.
pub const LUA_CONTENT_TYPE: &str = "text/x-lua";
/// Content type of the JSON manifest.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type of the zipped manifest.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Manifest base names served by every repository.
pub const MANIFEST_NAMES: [&str; 5] = [
    "manifest",
    "manifest-5.1",
    "manifest-5.2",
    "manifest-5.3",
    "manifest-5.4",
];

const LUA_KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Output encoding of a manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestFormat {
    Lua,
    Json,
    Zip,
}

impl ManifestFormat {
    /// Pick the format from the requested path's extension.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".json") {
            Self::Json
        } else if path.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Lua
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Lua => LUA_CONTENT_TYPE,
            Self::Json => JSON_CONTENT_TYPE,
            Self::Zip => ZIP_CONTENT_TYPE,
        }
    }
}

/// Render a catalog in the requested format.
///
/// `request_path` names the zip entry and is ignored by the other formats.
pub fn render(catalog: &Catalog, format: ManifestFormat, request_path: &str) -> Result<Vec<u8>> {
    match format {
        ManifestFormat::Lua => Ok(to_lua(catalog).into_bytes()),
        ManifestFormat::Json => to_json(catalog),
        ManifestFormat::Zip => to_zip(catalog, &archive_entry_name(request_path)),
    }
}

/// Write the Lua table manifest.
pub fn write_lua<W: Write>(catalog: &Catalog, w: &mut W) -> Result<()> {
    w.write_all(b"commands = {}\n")?;
    w.write_all(b"modules = {}\n")?;
    w.write_all(b"repository = {\n")?;

    for package in catalog.packages() {
        writeln!(w, "\t{} = {{", lua_key(&package.name))?;
        for version in &package.versions {
            writeln!(w, "\t\t{} = {{", quoted_key(&version.name))?;
            for arch in &version.arch {
                writeln!(w, "\t\t\t{{arch = \"{}\"}},", escape_lua(arch, '"'))?;
            }
            w.write_all(b"\t\t},\n")?;
        }
        w.write_all(b"\t},\n")?;
    }

    w.write_all(b"}")?;
    Ok(())
}

/// Lua table manifest as a string.
pub fn to_lua(catalog: &Catalog) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_lua(catalog, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// JSON manifest.
pub fn to_json(catalog: &Catalog) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(catalog)?)
}

/// Zip archive with one deflated entry containing the Lua manifest.
pub fn to_zip(catalog: &Catalog, entry_name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    archive.start_file(entry_name, options)?;
    write_lua(catalog, &mut archive)?;

    Ok(archive.finish()?.into_inner())
}

/// Archive entry name for a request path: the last path segment without its
/// extension (`/rocks/manifest-5.1.zip` -> `manifest-5.1`).
pub fn archive_entry_name(request_path: &str) -> String {
    let base = request_path.rsplit('/').next().unwrap_or(request_path);
    match base.rfind('.') {
        Some(dot) => base[..dot].to_string(),
        None => base.to_string(),
    }
}

fn lua_key(name: &str) -> String {
    if is_lua_identifier(name) {
        name.to_string()
    } else {
        quoted_key(name)
    }
}

fn quoted_key(name: &str) -> String {
    format!("['{}']", escape_lua(name, '\''))
}

fn is_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) && !LUA_KEYWORDS.contains(&name)
}

fn escape_lua(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
