use super::xml::{self, Element};
use super::{ContentType, ParseError, ParseResult, Parser, Provenance, Source};
use crate::config::ImportConfig;
use crate::sandbox::{self, Sandbox};
use crate::security::PathSanitizer;
use serde_json::{json, Map, Value};
use tracing::debug;

const MANIFEST_NAME: &str = "imsmanifest.xml";

/// SCORM 1.2 / 2004 package import
///
/// The manifest may sit below wrapper folders; every resource path is
/// resolved against the manifest's directory (the package root).
pub struct ScormParser {
    config: ImportConfig,
}

/// Which rung of the organization fallback chain produced the outline
enum Outline<'a> {
    Organization(&'a Element),
    ItemTree(&'a Element),
}

/// Locate the shallowest `imsmanifest.xml`, ignoring macOS resource forks
pub(crate) fn find_manifest<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    names
        .into_iter()
        .filter(|name| !sandbox::is_resource_fork(name))
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            lower == MANIFEST_NAME || lower.ends_with(&format!("/{}", MANIFEST_NAME))
        })
        .min_by_key(|name| name.matches('/').count())
}

impl ScormParser {
    pub fn new() -> Self {
        Self::with_config(&ImportConfig::default())
    }

    pub fn with_config(config: &ImportConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Capability flag; when off the parser declines every input
    pub fn is_available(&self) -> bool {
        self.config.scorm_enabled
    }

    /// Pick the course outline: default organization, then the first
    /// organization, then the first `<item>` anywhere in the manifest.
    fn select_outline<'a>(
        manifest: &'a Element,
        warnings: &mut Vec<String>,
    ) -> Result<(Outline<'a>, usize), ParseError> {
        let organizations = manifest.child("organizations");
        let orgs: Vec<&Element> = organizations
            .map(|o| o.children_named("organization").collect())
            .unwrap_or_default();
        let default_id = organizations.and_then(|o| o.attr("default"));

        if let Some(id) = default_id {
            let declared = orgs
                .iter()
                .copied()
                .find(|org| org.attr("identifier") == Some(id));
            if let Some(org) = declared {
                return Ok((Outline::Organization(org), orgs.len()));
            }
        }

        if let Some(first) = orgs.first().copied() {
            let first_id = first.attr("identifier").unwrap_or("(unnamed)");
            match default_id {
                Some(id) => warnings.push(format!(
                    "Default organization '{}' not found; using first organization '{}'",
                    id, first_id
                )),
                None if orgs.len() > 1 => warnings.push(format!(
                    "No default organization declared; using first of {} organizations '{}'",
                    orgs.len(),
                    first_id
                )),
                None => {}
            }
            return Ok((Outline::Organization(first), orgs.len()));
        }

        if let Some(item) = manifest.find("item") {
            warnings.push("No organizations found; using the first item tree".to_string());
            return Ok((Outline::ItemTree(item), 0));
        }

        Err(ParseError::format("SCORM", "manifest has no organizations or items"))
    }

    /// Only direct `<item>` children are visited; nested ones are reached by recursion.
    fn walk_item(item: &Element, count: &mut usize, warnings: &mut Vec<String>) -> Value {
        *count += 1;
        let identifier = item.attr("identifier");
        let title = item.child_text("title");
        if title.is_none() {
            warnings.push(format!(
                "Item '{}' has no title",
                identifier.unwrap_or("(unnamed)")
            ));
        }

        let children: Vec<Value> = item
            .children_named("item")
            .map(|child| Self::walk_item(child, count, warnings))
            .collect();

        json!({
            "identifier": identifier,
            "title": title,
            "resource_id": item.attr("identifierref"),
            "items": children,
        })
    }

    fn collect_resources(manifest: &Element, warnings: &mut Vec<String>) -> Map<String, Value> {
        let mut resources = Map::new();
        let Some(section) = manifest.child("resources") else {
            warnings.push("Manifest declares no resources".to_string());
            return resources;
        };

        for resource in section.children_named("resource") {
            let Some(identifier) = resource.attr("identifier") else {
                warnings.push("Skipped a resource without an identifier".to_string());
                continue;
            };
            let files: Vec<&str> = resource
                .children_named("file")
                .filter_map(|f| f.attr("href"))
                .collect();

            resources.insert(
                identifier.to_string(),
                json!({
                    "type": resource.attr("type"),
                    "scorm_type": resource.attr("scormtype"),
                    "href": resource.attr("href"),
                    "files": files,
                }),
            );
        }

        resources
    }

    /// Package paths of HTML launch pages, keyed by resource identifier
    fn html_targets(package_root: &str, resources: &Map<String, Value>) -> Vec<(String, String)> {
        let mut targets = Vec::new();

        for (identifier, resource) in resources {
            let Some(href) = resource["href"].as_str() else {
                continue;
            };
            if !href.to_ascii_lowercase().ends_with(".html") {
                continue;
            }

            match PathSanitizer::resolve_within(package_root, href) {
                Ok(path) => targets.push((identifier.clone(), path)),
                Err(e) => debug!(%identifier, %href, error = %e, "unresolvable resource href"),
            }
        }

        targets
    }

    /// Best-effort inlining of HTML launch pages; misses are not reported
    fn inline_html(pages: &Sandbox, targets: &[(String, String)]) -> Map<String, Value> {
        let mut html = Map::new();

        for (identifier, path) in targets {
            match pages.get(path).map(std::str::from_utf8) {
                Some(Ok(body)) => {
                    html.insert(identifier.clone(), body.into());
                }
                Some(Err(_)) => debug!(%path, "resource is not UTF-8"),
                None => debug!(%path, "resource file missing from package"),
            }
        }

        html
    }

    fn check_references(
        modules: &[Value],
        resources: &Map<String, Value>,
        warnings: &mut Vec<String>,
    ) {
        for item in modules {
            if let Some(resource_id) = item["resource_id"].as_str() {
                if !resources.contains_key(resource_id) {
                    warnings.push(format!(
                        "Item '{}' references missing resource '{}'",
                        item["identifier"].as_str().unwrap_or("(unnamed)"),
                        resource_id
                    ));
                }
            }
            if let Some(children) = item["items"].as_array() {
                Self::check_references(children, resources, warnings);
            }
        }
    }
}

impl Default for ScormParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for ScormParser {
    fn format(&self) -> &'static str {
        "scorm"
    }

    fn can_parse(&self, source: Source<'_>, _filename: Option<&str>) -> bool {
        if !self.is_available() {
            return false;
        }
        source
            .binary()
            .and_then(sandbox::member_names)
            .map(|names| find_manifest(names.iter().map(String::as_str)).is_some())
            .unwrap_or(false)
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        if !self.is_available() {
            return Err(ParseError::Unavailable("SCORM"));
        }
        let bytes = source.binary().ok_or(ParseError::BinaryRequired("SCORM"))?;
        let provenance = Provenance::new(self.format(), filename, source);

        // Two central-directory passes: the manifest first, then only the
        // launch pages it names. Media members are listed but never read.
        let listing = self
            .config
            .sandbox()
            .ingest_zip_with(bytes, |member| {
                find_manifest([member.virtual_path.as_str()]).is_some()
            })?
            .build();
        let mut warnings: Vec<String> = listing.skipped().to_vec();

        let manifest_path = find_manifest(listing.members().map(|m| m.virtual_path.as_str()))
            .ok_or_else(|| ParseError::format("SCORM", "no imsmanifest.xml in package"))?
            .to_string();
        let package_root = manifest_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        if !package_root.is_empty() {
            warnings.push(format!(
                "Non-standard structure: manifest found at {}; resources resolved relative to {}/",
                manifest_path, package_root
            ));
        }
        debug!(manifest = %manifest_path, root = %package_root, "located SCORM manifest");

        let manifest_raw = listing.get(&manifest_path).ok_or_else(|| {
            ParseError::format("SCORM", "manifest exceeds the archive member size limit")
        })?;
        let manifest_text = std::str::from_utf8(manifest_raw)
            .map_err(|_| ParseError::format("SCORM", "manifest is not valid UTF-8"))?;
        let manifest = xml::parse(manifest_text, "SCORM")?;
        if manifest.name != "manifest" {
            warnings.push(format!("Unexpected manifest root element <{}>", manifest.name));
        }

        let (outline, organization_count) = Self::select_outline(&manifest, &mut warnings)?;

        let mut item_count = 0;
        let (organization_id, outline_title, modules) = match outline {
            Outline::Organization(org) => {
                let modules: Vec<Value> = org
                    .children_named("item")
                    .map(|item| Self::walk_item(item, &mut item_count, &mut warnings))
                    .collect();
                (org.attr("identifier"), org.child_text("title"), modules)
            }
            Outline::ItemTree(item) => {
                let module = Self::walk_item(item, &mut item_count, &mut warnings);
                (None, None, vec![module])
            }
        };

        let course_title = outline_title.or_else(|| {
            manifest
                .child("metadata")
                .and_then(|m| m.find("title"))
                .map(|t| t.text().trim().to_string())
                .filter(|t| !t.is_empty())
        });

        let scorm_version = manifest
            .child("metadata")
            .and_then(|m| m.child_text("schemaversion"));

        let resources = Self::collect_resources(&manifest, &mut warnings);
        Self::check_references(&modules, &resources, &mut warnings);
        let targets = Self::html_targets(&package_root, &resources);
        let pages = self
            .config
            .sandbox()
            .ingest_zip_with(bytes, |member| {
                targets.iter().any(|(_, path)| *path == member.virtual_path)
            })?
            .build();
        for note in pages.skipped() {
            if !warnings.contains(note) {
                warnings.push(note.clone());
            }
        }
        let html_content = Self::inline_html(&pages, &targets);

        let resource_count = resources.len();
        let html_count = html_content.len();

        Ok(ParseResult::new(
            ContentType::Blueprint,
            json!({
                "course_title": course_title,
                "modules": modules,
                "resources": resources,
                "html_content": html_content,
            }),
            provenance,
        )
        .with_metadata("manifest_path", manifest_path)
        .with_metadata("package_root", package_root)
        .with_metadata("scorm_version", scorm_version)
        .with_metadata("organization_id", organization_id)
        .with_metadata("organization_count", organization_count)
        .with_metadata("item_count", item_count)
        .with_metadata("resource_count", resource_count)
        .with_metadata("html_count", html_count)
        .with_warnings(warnings))
    }
}
