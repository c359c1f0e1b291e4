use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{AggregateConfig, FragmentConfig, GeneratorConfig};
use crate::content::{ContentError, ContentFile, load_content, slug_of};
use crate::store::FileStore;
use crate::template::{Bindings, Template, TemplateError};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to write generated module {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rendered source file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub path: PathBuf,
    pub module_name: String,
    pub source: String,
}

/// `hello-world.md` becomes `HelloWorld`: drop the extension, split on the
/// delimiter, capitalize each segment, join.
pub fn module_name(filename: &str, delimiter: &str) -> String {
    let stem = slug_of(filename);
    if delimiter.is_empty() {
        return capitalize(stem);
    }
    stem.split(delimiter).map(capitalize).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders per-post modules and the aggregate index modules from the fixed
/// templates in one directory.
pub struct ModuleGenerator {
    config: GeneratorConfig,
    post_template: Template,
    post_extension: Option<String>,
    aggregates: Vec<(AggregateConfig, Template)>,
    fragments: Vec<(FragmentConfig, Template)>,
    /// Front-matter keys every file binds, present or not.
    meta_keys: BTreeSet<String>,
}

impl ModuleGenerator {
    pub fn load<S: FileStore>(
        store: &S,
        template_dir: &Path,
        config: &GeneratorConfig,
    ) -> Result<Self, GenerateError> {
        let post_path = template_dir.join(&config.post_template);
        let post_template = Template::load(store, &post_path)?;
        let post_extension = Path::new(&config.post_template)
            .extension()
            .map(|ext| ext.to_string_lossy().to_string());

        let mut aggregates = Vec::new();
        for aggregate in &config.aggregates {
            let path = template_dir.join(&aggregate.template);
            if aggregate.optional && !store.exists(&path) {
                debug!(target: "generate", "no {}, skipping", path.display());
                continue;
            }
            aggregates.push((aggregate.clone(), Template::load(store, &path)?));
        }

        let fragments = config
            .fragments
            .iter()
            .map(|f| (f.clone(), Template::parse(format!("fragment `{}`", f.token), &f.pattern)))
            .collect::<Vec<_>>();

        let mut meta_keys: BTreeSet<String> = ["title", "description", "image", "date"]
            .into_iter()
            .map(String::from)
            .chain(config.required.iter().cloned())
            .collect();
        let referenced = std::iter::once(&post_template)
            .chain(fragments.iter().map(|(_, t)| t))
            .flat_map(|t| t.placeholders())
            .filter_map(|name| name.strip_prefix("meta."))
            .map(String::from);
        meta_keys.extend(referenced);

        Ok(Self {
            config: config.clone(),
            post_template,
            post_extension,
            aggregates,
            fragments,
            meta_keys,
        })
    }

    fn qualified_name(&self, name: &str) -> String {
        if self.config.module_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.config.module_prefix, name)
        }
    }

    /// Everything a post template or fragment can refer to for one file.
    pub fn file_bindings(&self, file: &ContentFile) -> Bindings {
        let name = module_name(&file.filename, &self.config.delimiter);
        let mut bindings = Bindings::new();

        bindings
            .bind("moduleName", self.qualified_name(&name))
            .bind("name", name)
            .bind("slug", file.slug())
            .bind("filename", file.filename.as_str())
            .bind(
                "content",
                serde_json::Value::String(file.body.clone()).to_string(),
            );

        for (key, value) in &file.meta.extra {
            bindings.bind(format!("meta.{key}"), value.as_str());
        }
        // Missing required keys get the placeholder, other missing keys are empty.
        for key in &self.meta_keys {
            let value = file.field(key, &self.config.required).unwrap_or_default();
            bindings.bind(format!("meta.{key}"), value);
        }

        bindings
    }

    pub fn render_post(
        &self,
        file: &ContentFile,
        out_dir: &Path,
    ) -> Result<GeneratedModule, GenerateError> {
        let name = module_name(&file.filename, &self.config.delimiter);
        let mut filename = PathBuf::from(&name);
        if let Some(ext) = &self.post_extension {
            filename.set_extension(ext);
        }

        Ok(GeneratedModule {
            path: out_dir.join(&self.config.post_output_dir).join(filename),
            module_name: self.qualified_name(&name),
            source: self.post_template.render(&self.file_bindings(file))?,
        })
    }

    pub fn render_aggregates(
        &self,
        files: &BTreeMap<String, ContentFile>,
        out_dir: &Path,
    ) -> Result<Vec<GeneratedModule>, GenerateError> {
        let per_file: Vec<Bindings> = files.values().map(|f| self.file_bindings(f)).collect();

        let mut bindings = Bindings::new();
        bindings.bind("modulePrefix", self.config.module_prefix.as_str());
        for (fragment, template) in &self.fragments {
            let rendered = per_file
                .iter()
                .map(|b| template.render(b))
                .collect::<Result<Vec<_>, _>>()?;
            bindings.bind(fragment.token.as_str(), rendered.join(&fragment.separator));
        }

        self.aggregates
            .iter()
            .map(|(aggregate, template)| -> Result<GeneratedModule, GenerateError> {
                let module_name = aggregate
                    .output
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                Ok(GeneratedModule {
                    path: out_dir.join(&aggregate.output),
                    module_name,
                    source: template.render(&bindings)?,
                })
            })
            .collect()
    }

    /// Render every module without touching the store.
    pub fn render_all(
        &self,
        files: &BTreeMap<String, ContentFile>,
        out_dir: &Path,
    ) -> Result<Vec<GeneratedModule>, GenerateError> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        let mut modules = Vec::with_capacity(files.len() + self.aggregates.len());

        for file in files.values() {
            let module = self.render_post(file, out_dir)?;
            if let Some(previous) = seen.insert(module.module_name.clone(), &file.filename) {
                warn!(
                    target: "generate",
                    "{} and {} both map to module {}; the later one wins",
                    previous, file.filename, module.module_name
                );
            }
            modules.push(module);
        }

        modules.extend(self.render_aggregates(files, out_dir)?);
        Ok(modules)
    }
}

/// Write modules, overwriting whatever exists.
pub fn write_modules<S: FileStore>(
    store: &S,
    modules: &[GeneratedModule],
) -> Result<Vec<PathBuf>, GenerateError> {
    let mut written = Vec::with_capacity(modules.len());
    for module in modules {
        store
            .write(&module.path, &module.source)
            .map_err(|source| GenerateError::Write {
                path: module.path.clone(),
                source,
            })?;
        debug!(target: "generate", "{} -> {}", module.module_name, module.path.display());
        written.push(module.path.clone());
    }
    Ok(written)
}

/// Load content, render every module and write it under `out_dir`.
pub fn generate<S: FileStore>(
    store: &S,
    content_dir: &Path,
    template_dir: &Path,
    out_dir: &Path,
    config: &GeneratorConfig,
) -> Result<Vec<PathBuf>, GenerateError> {
    let files = load_content(store, content_dir, &config.extension)?;
    let generator = ModuleGenerator::load(store, template_dir, config)?;
    let modules = generator.render_all(&files, out_dir)?;
    let written = write_modules(store, &modules)?;

    info!(target: "generate", "{} modules in {}", written.len(), out_dir.display());
    Ok(written)
}
