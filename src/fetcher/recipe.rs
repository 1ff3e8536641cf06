//! Recipe page parsing
//!
//! Extracts a structured record from the site's schema.org-annotated recipe
//! markup. The pages interleave ad blocks and inline scripts with the actual
//! content, so extraction strips known noise before accepting a value. The
//! nutrition block is not in the DOM at all; it lives in an inline script as
//! a `nutrinfo` JSON object and is pulled out of the raw HTML.

use crate::normalize::collapse_ws;
use crate::output::RecipeRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;

fn noise_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?is)if\(general_glob_settings[\s\S]+?(ШАГ\s+\d+\.|$)",
            r"(?is)\(adsbygoogle\s*=\s*window\.adsbygoogle[\s\S]+?(ШАГ\s+\d+\.|$)",
            r"(?is)\(function\(w,\s*d,\s*n,\s*s,\s*t\)[\s\S]+?(Шаг\s+\d+:|$)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid noise pattern"))
        .collect()
    })
}

fn ad_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bРеклама\b").expect("valid ad-word pattern"))
}

fn nutrinfo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)nutrinfo\s*:\s*(\{.*?\})").expect("valid nutrinfo pattern"))
}

/// Parses a recipe page into a record
///
/// Returns None when the page has no recipe markup or is missing any of the
/// required fields (title, ingredients, instructions).
pub fn parse_recipe(html: &str, url: &str) -> Option<RecipeRecord> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let recipe_root = first_element(root, r#"section[itemtype="http://schema.org/Recipe"]"#)
        .or_else(|| first_element(root, "#pt_info"))?;

    let title = first_meta(recipe_root, r#"meta[itemprop="name"]"#)
        .or_else(|| first_meta(recipe_root, r#"[itemprop="name"]"#))
        .or_else(|| first_text(root, "h1"))?;

    let ingredients = gather_meta_list(root, r#"meta[itemprop="recipeIngredient"]"#);
    let instructions = collect_instructions(root);
    if ingredients.is_empty() || instructions.is_empty() {
        return None;
    }

    let equipment = gather_text_list(root, ".recipe-equipment li");
    let categories = breadcrumb_list(root);
    let tags = gather_text_list(
        root,
        ".sims-tags-line a, .catalogs-list-grid a, .catalogs-list-grid .item a",
    );

    let nutrition = extract_nutrition(html);

    let mut record = RecipeRecord::new(
        title,
        instructions.join("\n"),
        ingredients.join(", "),
        url.to_string(),
    );
    record.description = first_meta(recipe_root, r#"[itemprop="description"]"#);
    record.author = first_meta(recipe_root, r#"[itemprop="author"] [itemprop="name"]"#);
    record.total_time = first_meta(recipe_root, r#"[itemprop="totalTime"]"#);
    record.servings = first_meta(recipe_root, r#"[itemprop="recipeYield"]"#);
    record.rating_value = first_meta(recipe_root, r#"[itemprop="ratingValue"]"#);
    record.rating_count = first_meta(recipe_root, r#"[itemprop="reviewCount"]"#);
    record.calories = first_text(root, r#"[itemprop="calories"]"#);
    record.image = first_meta(root, r#"meta[property="og:image"]"#);
    record.categories = join_non_empty(categories);
    record.equipment = join_non_empty(equipment);
    record.tags = join_non_empty(tags);
    record.protein_percent = nutrition.protein_percent;
    record.protein_grams = nutrition.protein_grams;
    record.fat_percent = nutrition.fat_percent;
    record.fat_grams = nutrition.fat_grams;
    record.carb_percent = nutrition.carb_percent;
    record.carb_grams = nutrition.carb_grams;
    record.calories_per_100g = nutrition.calories_per_100g;
    record.calories_total = nutrition.calories_total;
    record.gi_min = nutrition.gi_min;
    record.gi_avg = nutrition.gi_avg;
    record.gi_max = nutrition.gi_max;
    record.total_weight_grams = nutrition.total_weight_grams;

    Some(record)
}

fn join_non_empty(values: Vec<String>) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

fn first_element<'a>(scope: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    scope.select(&selector).next()
}

/// First match's `content` attribute, falling back to its text
fn first_meta(scope: ElementRef<'_>, selector: &str) -> Option<String> {
    let node = first_element(scope, selector)?;
    let content = node
        .value()
        .attr("content")
        .map(collapse_ws)
        .filter(|s| !s.is_empty());
    if content.is_some() {
        return content;
    }
    Some(collapse_ws(&node.text().collect::<String>())).filter(|s| !s.is_empty())
}

fn first_text(scope: ElementRef<'_>, selector: &str) -> Option<String> {
    let node = first_element(scope, selector)?;
    Some(collapse_ws(&node.text().collect::<String>())).filter(|s| !s.is_empty())
}

fn gather_meta_list(scope: ElementRef<'_>, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let mut values = Vec::new();
    for node in scope.select(&selector) {
        let raw = match node.value().attr("content") {
            Some(content) if !content.is_empty() => content.to_string(),
            _ => node.text().collect::<String>(),
        };
        let cleaned = collapse_ws(&raw);
        if !cleaned.is_empty() {
            values.push(cleaned);
        }
    }
    dedupe(values)
}

fn gather_text_list(scope: ElementRef<'_>, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let mut results = Vec::new();
    for node in scope.select(&selector) {
        if is_ad_node(node) {
            continue;
        }
        let text = node.text().collect::<String>();
        if text.is_empty() {
            continue;
        }
        let cleaned = strip_noise(&text);
        if !cleaned.is_empty() && !looks_like_ad_text(&cleaned) {
            results.push(cleaned);
        }
    }
    dedupe(results)
}

fn collect_instructions(root: ElementRef<'_>) -> Vec<String> {
    let mut instructions = gather_text_list(root, "ol.instructions li, .instructions li");

    let push_chunks = |node: ElementRef<'_>, out: &mut Vec<String>| {
        if is_ad_node(node) {
            return;
        }
        for chunk in split_br_text(node) {
            let cleaned = strip_noise(&chunk);
            if !cleaned.is_empty() && !looks_like_ad_text(&cleaned) {
                out.push(cleaned);
            }
        }
    };

    // Some layouts keep the steps in paragraphs or list items under the
    // recipeInstructions container, others as <br>-separated text directly
    // inside it; both shapes appear in the wild.
    if let Ok(selector) = Selector::parse(
        r#"[itemprop="recipeInstructions"] p, [itemprop="recipeInstructions"] li"#,
    ) {
        for node in root.select(&selector) {
            push_chunks(node, &mut instructions);
        }
    }
    if let Ok(selector) = Selector::parse(r#"[itemprop="recipeInstructions"]"#) {
        for node in root.select(&selector) {
            push_chunks(node, &mut instructions);
        }
    }

    dedupe(instructions)
}

/// Splits an element's markup on paragraph and line breaks, dropping tags
fn split_br_text(node: ElementRef<'_>) -> Vec<String> {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    static PARA_RE: OnceLock<Regex> = OnceLock::new();
    static BR_RE: OnceLock<Regex> = OnceLock::new();
    static TAG_RE: OnceLock<Regex> = OnceLock::new();

    let script_re = SCRIPT_RE
        .get_or_init(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid pattern"));
    let para_re = PARA_RE.get_or_init(|| Regex::new(r"(?i)</?p[^>]*>").expect("valid pattern"));
    let br_re = BR_RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid pattern"));
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid pattern"));

    let html = node.html();
    let without_scripts = script_re.replace_all(&html, " ");
    let with_breaks = para_re.replace_all(&without_scripts, "\n");
    let with_breaks = br_re.replace_all(&with_breaks, "\n");
    let text_only = tag_re.replace_all(&with_breaks, " ");

    text_only
        .split('\n')
        .map(collapse_ws)
        .filter(|part| !part.is_empty())
        .collect()
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| !value.is_empty() && seen.insert(value.clone()))
        .collect()
}

fn strip_noise(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in noise_patterns() {
        // The trailing step marker is part of the match; keep it in place.
        cleaned = pattern.replace_all(&cleaned, " $1").into_owned();
    }
    cleaned = ad_word_re().replace_all(&cleaned, " ").into_owned();
    collapse_ws(&cleaned)
}

fn looks_like_ad_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    [
        "adfox",
        "adsbygoogle",
        "ya.adfox",
        "yacontextcb",
        "google-ya",
        "iface.jsappend",
        "(function(",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
}

fn is_ad_node(node: ElementRef<'_>) -> bool {
    node.value()
        .attr("class")
        .map(|classes| classes.contains("as-ad-step"))
        .unwrap_or(false)
}

fn breadcrumb_list(root: ElementRef<'_>) -> Vec<String> {
    let Ok(selector) = Selector::parse("ol.breadcrumbs li span[itemprop='name']") else {
        return Vec::new();
    };
    root.select(&selector)
        .map(|node| collapse_ws(&node.text().collect::<String>()))
        .filter(|crumb| !crumb.is_empty() && crumb.to_lowercase() != "главная")
        .collect()
}

#[derive(Debug, Default)]
struct Nutrition {
    protein_percent: Option<String>,
    protein_grams: Option<String>,
    fat_percent: Option<String>,
    fat_grams: Option<String>,
    carb_percent: Option<String>,
    carb_grams: Option<String>,
    calories_per_100g: Option<String>,
    calories_total: Option<String>,
    gi_min: Option<String>,
    gi_avg: Option<String>,
    gi_max: Option<String>,
    total_weight_grams: Option<String>,
}

fn extract_nutrition(html: &str) -> Nutrition {
    let Some(caps) = nutrinfo_re().captures(html) else {
        return Nutrition::default();
    };
    let Ok(data) = serde_json::from_str::<serde_json::Value>(&caps[1]) else {
        return Nutrition::default();
    };

    let cals = maybe_str(data.get("cals"));
    let total_weight = data.get("total_weight").and_then(value_f64).unwrap_or(0.0);
    let calories_total = match (&cals, total_weight != 0.0) {
        (Some(cals), true) => cals
            .parse::<f64>()
            .ok()
            .map(|per_100g| ((per_100g * total_weight / 100.0).round() as i64).to_string()),
        _ => None,
    };

    Nutrition {
        protein_percent: maybe_str(data.get("ratio_p")),
        protein_grams: maybe_str(data.get("p")),
        fat_percent: maybe_str(data.get("ratio_f")),
        fat_grams: maybe_str(data.get("f")),
        carb_percent: maybe_str(data.get("ratio_c")),
        carb_grams: maybe_str(data.get("c")),
        calories_per_100g: cals,
        calories_total,
        gi_min: maybe_str(data.get("ratio_cn")),
        gi_avg: maybe_str(data.get("ratio_cs")),
        gi_max: maybe_str(data.get("ratio_cv")),
        total_weight_grams: if total_weight != 0.0 {
            maybe_str(data.get("total_weight"))
        } else {
            maybe_str(Some(&serde_json::Value::from(0)))
        },
    }
}

fn maybe_str(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn value_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
