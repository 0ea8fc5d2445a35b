use html_escape::decode_html_entities;
use log::debug;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::identity::{slug_from_url, FALLBACK_SLUG};
use crate::model::Recipe;
use crate::video::youtube_id_from_url;

pub struct ParsingContext {
    pub url: String,
    pub document: Html,
}

impl ParsingContext {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            document: Html::parse_document(html),
        }
    }
}

pub trait Extractor {
    fn parse(&self, context: &ParsingContext) -> Option<Recipe>;
}

/// Reads schema.org `Recipe` objects from `application/ld+json` scripts
pub struct JsonLdExtractor;

/// Reads `og:title`, `og:description` and `og:image` meta tags
pub struct OpenGraphExtractor;

#[derive(Debug, Deserialize)]
struct JsonLdRecipe {
    name: Option<String>,
    description: Option<DescriptionType>,
    image: Option<ImageType>,
    #[serde(rename = "recipeIngredient")]
    recipe_ingredient: Option<RecipeIngredients>,
    #[serde(rename = "recipeInstructions")]
    recipe_instructions: Option<RecipeInstructions>,
    #[serde(rename = "recipeYield")]
    recipe_yield: Option<RecipeYield>,
    #[serde(rename = "prepTime")]
    prep_time: Option<String>,
    #[serde(rename = "cookTime")]
    cook_time: Option<String>,
    #[serde(rename = "totalTime")]
    total_time: Option<String>,
    #[serde(rename = "recipeCategory")]
    recipe_category: Option<StringOrList>,
    #[serde(rename = "recipeCuisine")]
    recipe_cuisine: Option<StringOrList>,
    keywords: Option<StringOrList>,
    video: Option<VideoType>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TextObject {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptionType {
    String(String),
    Object(TextObject),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageType {
    String(String),
    Object(ImageObject),
    MultipleStrings(Vec<String>),
    MultipleObjects(Vec<ImageObject>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeIngredients {
    Strings(Vec<String>),
    Objects(Vec<IngredientObject>),
    String(String),
}

#[derive(Debug, Deserialize)]
struct IngredientObject {
    name: String,
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeInstructions {
    String(String),
    Multiple(Vec<String>),
    HowTo(Vec<HowTo>),
    NestedSections(Vec<Vec<HowTo>>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "@type")]
enum HowTo {
    HowToStep(HowToStep),
    HowToSection(HowToSection),
}

#[derive(Debug, Deserialize)]
struct HowToStep {
    text: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HowToSection {
    #[serde(rename = "itemListElement")]
    item_list_element: Vec<HowToStep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeYield {
    String(String),
    Number(i64),
    Array(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    Multiple(Vec<String>),
}

impl StringOrList {
    /// Comma-separated strings are split too ("primi, pasta")
    fn into_labels(self) -> Vec<String> {
        let items = match self {
            StringOrList::String(s) => vec![s],
            StringOrList::Multiple(v) => v,
        };
        items
            .iter()
            .flat_map(|item| item.split(','))
            .map(|label| decode_html_symbols(label.trim()))
            .filter(|label| !label.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct VideoObject {
    #[serde(rename = "contentUrl")]
    content_url: Option<String>,
    #[serde(rename = "embedUrl")]
    embed_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoType {
    Object(VideoObject),
    Multiple(Vec<VideoObject>),
}

fn decode_html_symbols(text: &str) -> String {
    // some sites double-encode entities
    decode_html_entities(&decode_html_entities(text)).trim().to_string()
}

fn step_text(step: HowToStep) -> Option<String> {
    step.text.or(step.name)
}

fn instruction_lines(instructions: RecipeInstructions) -> Vec<String> {
    let raw: Vec<String> = match instructions {
        RecipeInstructions::String(text) => text.lines().map(str::to_string).collect(),
        RecipeInstructions::Multiple(steps) => steps,
        RecipeInstructions::HowTo(items) => items.into_iter().flat_map(howto_lines).collect(),
        RecipeInstructions::NestedSections(sections) => sections
            .into_iter()
            .flatten()
            .flat_map(howto_lines)
            .collect(),
    };
    raw.iter()
        .map(|line| decode_html_symbols(line))
        .filter(|line| !line.is_empty())
        .collect()
}

fn howto_lines(item: HowTo) -> Vec<String> {
    match item {
        HowTo::HowToStep(step) => step_text(step).into_iter().collect(),
        HowTo::HowToSection(section) => section
            .item_list_element
            .into_iter()
            .filter_map(step_text)
            .collect(),
    }
}

fn ingredient_lines(ingredients: RecipeIngredients) -> Vec<String> {
    let raw: Vec<String> = match ingredients {
        RecipeIngredients::Strings(items) => items,
        RecipeIngredients::String(text) => text.lines().map(str::to_string).collect(),
        RecipeIngredients::Objects(items) => items
            .into_iter()
            .map(|ing| match ing.amount.as_deref().map(str::trim) {
                Some(amount) if !amount.is_empty() => format!("{amount} {}", ing.name),
                _ => ing.name,
            })
            .collect(),
    };
    raw.iter()
        .map(|line| decode_html_symbols(line))
        .filter(|line| !line.is_empty())
        .collect()
}

fn first_image(image: ImageType) -> Option<String> {
    let url = match image {
        ImageType::String(url) => Some(url),
        ImageType::Object(obj) => Some(obj.url),
        ImageType::MultipleStrings(urls) => urls.into_iter().next(),
        ImageType::MultipleObjects(objs) => objs.into_iter().next().map(|obj| obj.url),
    };
    url.map(|url| decode_html_symbols(&url))
        .filter(|url| !url.is_empty())
}

fn video_id(video: VideoType) -> Option<String> {
    let objects = match video {
        VideoType::Object(obj) => vec![obj],
        VideoType::Multiple(objs) => objs,
    };
    objects
        .into_iter()
        .flat_map(|obj| [obj.embed_url, obj.content_url])
        .flatten()
        .find_map(|url| youtube_id_from_url(&url))
}

/// Slug for a page URL, or none when the URL has no usable path
fn page_slug(url: &str) -> Option<String> {
    let slug = slug_from_url(url);
    (slug != FALLBACK_SLUG).then_some(slug)
}

fn insert_text(extra: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        extra.insert(key.to_string(), Value::String(value));
    }
}

impl JsonLdExtractor {
    fn convert_to_recipe(&self, json_ld: JsonLdRecipe, url: &str) -> Recipe {
        let mut tags = Vec::new();
        for labels in [json_ld.keywords, json_ld.recipe_category, json_ld.recipe_cuisine]
            .into_iter()
            .flatten()
        {
            for label in labels.into_labels() {
                if !tags.iter().any(|t: &String| t.eq_ignore_ascii_case(&label)) {
                    tags.push(label);
                }
            }
        }

        let mut extra = Map::new();
        insert_text(
            &mut extra,
            "description",
            json_ld.description.map(|desc| match desc {
                DescriptionType::String(d) => decode_html_symbols(&d),
                DescriptionType::Object(d) => decode_html_symbols(&d.text),
            }),
        );
        insert_text(&mut extra, "image", json_ld.image.and_then(first_image));
        insert_text(
            &mut extra,
            "servings",
            json_ld.recipe_yield.map(|y| match y {
                RecipeYield::String(s) => s,
                RecipeYield::Number(n) => n.to_string(),
                // prefer the descriptive variant ("4 porzioni") over the bare number
                RecipeYield::Array(items) => items
                    .iter()
                    .find(|s| s.contains(char::is_alphabetic))
                    .or_else(|| items.first())
                    .cloned()
                    .unwrap_or_default(),
            }),
        );
        insert_text(&mut extra, "prepTime", json_ld.prep_time);
        insert_text(&mut extra, "cookTime", json_ld.cook_time);
        insert_text(&mut extra, "totalTime", json_ld.total_time);

        Recipe {
            title: json_ld
                .name
                .map(|name| decode_html_symbols(&name))
                .unwrap_or_default(),
            source_url: Some(url.to_string()),
            slug: page_slug(url),
            ingredients: json_ld
                .recipe_ingredient
                .map(ingredient_lines)
                .unwrap_or_default(),
            steps: json_ld
                .recipe_instructions
                .map(instruction_lines)
                .unwrap_or_default(),
            tags,
            youtube_id: json_ld.video.and_then(video_id),
            extra,
        }
    }
}

fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case("recipe")),
        _ => false,
    }
}

/// Find the recipe object in a JSON-LD document: the root, an array item or
/// an `@graph` entry.
fn find_recipe(json_ld: &Value) -> Option<&Value> {
    if is_recipe_type(json_ld) {
        return Some(json_ld);
    }
    if let Some(items) = json_ld.as_array() {
        return items.iter().find_map(find_recipe);
    }
    json_ld
        .get("@graph")
        .and_then(Value::as_array)
        .and_then(|items| items.iter().find(|item| is_recipe_type(item)))
}

fn sanitize_json(json_str: &str) -> String {
    let mut cleaned = json_str.trim().to_string();

    // Drop anything before the first object or array
    if !cleaned.starts_with('{') && !cleaned.starts_with('[') {
        if let Some(start) = cleaned.find(['{', '[']) {
            cleaned = cleaned[start..].to_string();
        }
    }

    cleaned = cleaned.replace(",]", "]").replace(",}", "}");
    cleaned.replace("<!--", "").replace("-->", "")
}

impl Extractor for JsonLdExtractor {
    fn parse(&self, context: &ParsingContext) -> Option<Recipe> {
        let selector = Selector::parse("script[type='application/ld+json']").ok()?;

        for (index, script) in context.document.select(&selector).enumerate() {
            let cleaned = sanitize_json(&script.inner_html());
            let json_ld = match serde_json::from_str::<Value>(&cleaned) {
                Ok(value) => value,
                Err(e) => {
                    debug!("JsonLdExtractor: script {} is not JSON: {}", index, e);
                    continue;
                }
            };

            let Some(recipe) = find_recipe(&json_ld) else {
                debug!("JsonLdExtractor: no Recipe in script {}", index);
                continue;
            };

            match serde_json::from_value::<JsonLdRecipe>(recipe.clone()) {
                Ok(parsed) => return Some(self.convert_to_recipe(parsed, &context.url)),
                Err(e) => debug!("JsonLdExtractor: Recipe in script {} rejected: {}", index, e),
            }
        }
        None
    }
}

impl OpenGraphExtractor {
    fn meta(document: &Html, property: &str) -> Option<String> {
        let selector = Selector::parse(&format!("meta[property='{property}']")).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(decode_html_symbols)
            .find(|content| !content.is_empty())
    }
}

impl Extractor for OpenGraphExtractor {
    fn parse(&self, context: &ParsingContext) -> Option<Recipe> {
        let title = Self::meta(&context.document, "og:title")?;

        let mut extra = Map::new();
        insert_text(
            &mut extra,
            "description",
            Self::meta(&context.document, "og:description"),
        );
        insert_text(&mut extra, "image", Self::meta(&context.document, "og:image"));

        Some(Recipe {
            title,
            source_url: Some(context.url.clone()),
            slug: page_slug(&context.url),
            youtube_id: Self::meta(&context.document, "og:video")
                .and_then(|url| youtube_id_from_url(&url)),
            extra,
            ..Default::default()
        })
    }
}

/// Extract a candidate record from a fetched page.
///
/// JSON-LD is preferred; OpenGraph fills in a missing title, or provides a
/// title-only record when the page has no structured recipe (such a record
/// will later fail validation and be reported).
pub fn extract_recipe(url: &str, html: &str) -> Option<Recipe> {
    let context = ParsingContext::new(url, html);
    let open_graph = OpenGraphExtractor.parse(&context);

    match JsonLdExtractor.parse(&context) {
        Some(mut recipe) => {
            if recipe.title.is_empty() {
                if let Some(og) = open_graph {
                    recipe.title = og.title;
                }
            }
            Some(recipe)
        }
        None => open_graph,
    }
}
