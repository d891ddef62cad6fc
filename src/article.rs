use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const TITLE_MAX_CHARS: usize = 100;
pub const EXCERPT_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 191;
pub const AUTHOR_MAX_CHARS: usize = 191;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    World,
    Politics,
    Business,
    Technology,
    Science,
    Sports,
    Entertainment,
    Health,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::World,
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Sports,
        Category::Entertainment,
        Category::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::World => "World",
            Category::Politics => "Politics",
            Category::Business => "Business",
            Category::Technology => "Technology",
            Category::Science => "Science",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
        }
    }

    /// Case-insensitive lookup; `"technology"` and `"Technology"` are the same category.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub image: String,
    pub category: Category,
    pub author: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tags arrive either as `["a", "b"]` or as `"a,b"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Delimited(String),
}

impl TagsInput {
    pub fn into_tags(self) -> Vec<String> {
        match self {
            TagsInput::List(items) => normalize_tags(items),
            TagsInput::Delimited(raw) => normalize_tags(raw.split(',')),
        }
    }
}

pub fn normalize_tags<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Raw article fields as posted by the admin console. Used for both create and update;
/// create requires the mandatory fields, update only validates what is present.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Option<TagsInput>,
    pub featured: Option<bool>,
}

impl ArticleInput {
    pub fn into_article(self, id: String, now: DateTime<Utc>) -> AppResult<Article> {
        let title = present(self.title);
        let slug = present(self.slug)
            .or_else(|| title.as_deref().map(slugify))
            .filter(|s| !s.is_empty());
        let content = present(self.content);
        let excerpt = present(self.excerpt);
        let image = present(self.image);
        let category = present(self.category);
        let author = present(self.author);

        let missing: Vec<&str> = [
            ("title", title.is_none()),
            ("slug", slug.is_none()),
            ("content", content.is_none()),
            ("excerpt", excerpt.is_none()),
            ("image", image.is_none()),
            ("category", category.is_none()),
            ("author", author.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (
            Some(title),
            Some(slug),
            Some(content),
            Some(excerpt),
            Some(image),
            Some(category),
            Some(author),
        ) = (title, slug, content, excerpt, image, category, author)
        else {
            return Err(AppError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        check_title(&title)?;
        check_slug(&slug)?;
        check_excerpt(&excerpt)?;
        check_author(&author)?;
        let category = check_category(&category)?;

        Ok(Article {
            id,
            title,
            slug,
            content,
            excerpt,
            image,
            category,
            author,
            tags: self.tags.map(TagsInput::into_tags).unwrap_or_default(),
            featured: self.featured.unwrap_or(false),
            published_at: now,
            updated_at: now,
        })
    }

    pub fn into_patch(self) -> AppResult<ArticlePatch> {
        let title = supplied(self.title, "title")?;
        if let Some(title) = &title {
            check_title(title)?;
        }
        let slug = supplied(self.slug, "slug")?;
        if let Some(slug) = &slug {
            check_slug(slug)?;
        }
        let excerpt = supplied(self.excerpt, "excerpt")?;
        if let Some(excerpt) = &excerpt {
            check_excerpt(excerpt)?;
        }
        let author = supplied(self.author, "author")?;
        if let Some(author) = &author {
            check_author(author)?;
        }
        let category = match supplied(self.category, "category")? {
            Some(raw) => Some(check_category(&raw)?),
            None => None,
        };

        Ok(ArticlePatch {
            title,
            slug,
            content: supplied(self.content, "content")?,
            excerpt,
            image: supplied(self.image, "image")?,
            category,
            author,
            tags: self.tags.map(TagsInput::into_tags),
            featured: self.featured,
        })
    }
}

/// Validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub image: Option<String>,
    pub category: Option<Category>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

impl ArticlePatch {
    /// Merges supplied fields into `article`. `published_at` is never touched.
    pub fn apply(self, article: &mut Article, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            article.title = title;
        }
        if let Some(slug) = self.slug {
            article.slug = slug;
        }
        if let Some(content) = self.content {
            article.content = content;
        }
        if let Some(excerpt) = self.excerpt {
            article.excerpt = excerpt;
        }
        if let Some(image) = self.image {
            article.image = image;
        }
        if let Some(category) = self.category {
            article.category = category;
        }
        if let Some(author) = self.author {
            article.author = author;
        }
        if let Some(tags) = self.tags {
            article.tags = tags;
        }
        if let Some(featured) = self.featured {
            article.featured = featured;
        }
        article.updated_at = now;
    }
}

/// Query string of `GET /api/articles`. Values are kept as text and interpreted leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub featured: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArticleQuery {
    pub featured_only: bool,
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl From<ListParams> for ArticleQuery {
    fn from(params: ListParams) -> Self {
        let featured_only = params
            .featured
            .map(|f| {
                let f = f.trim();
                f.eq_ignore_ascii_case("true") || f == "1"
            })
            .unwrap_or(false);
        let limit = params
            .limit
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| *l > 0);

        Self {
            featured_only,
            category: present(params.category),
            search: present(params.q),
            limit,
        }
    }
}

impl ArticleQuery {
    pub fn matches(&self, article: &Article) -> bool {
        if self.featured_only && !article.featured {
            return false;
        }
        if let Some(category) = &self.category {
            if !article.category.as_str().eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [&article.title, &article.content, &article.excerpt]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// `"Global Climate Summit 2024"` -> `"global-climate-summit-2024"`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn supplied(value: Option<String>, name: &str) -> AppResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) => match present(Some(v)) {
            Some(v) => Ok(Some(v)),
            None => Err(AppError::validation(format!("{} cannot be empty", name))),
        },
    }
}

fn check_title(title: &str) -> AppResult<()> {
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Title cannot be more than {} characters",
            TITLE_MAX_CHARS
        )));
    }
    Ok(())
}

fn check_excerpt(excerpt: &str) -> AppResult<()> {
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Excerpt cannot be more than {} characters",
            EXCERPT_MAX_CHARS
        )));
    }
    Ok(())
}

fn check_author(author: &str) -> AppResult<()> {
    if author.chars().count() > AUTHOR_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Author cannot be more than {} characters",
            AUTHOR_MAX_CHARS
        )));
    }
    Ok(())
}

fn check_slug(slug: &str) -> AppResult<()> {
    if !is_valid_slug(slug) {
        return Err(AppError::validation(
            "Slug may only contain letters, digits, '-' and '_'",
        ));
    }
    if slug.chars().count() > SLUG_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Slug cannot be more than {} characters",
            SLUG_MAX_CHARS
        )));
    }
    Ok(())
}

fn check_category(raw: &str) -> AppResult<Category> {
    Category::parse(raw).ok_or_else(|| {
        let names: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        AppError::validation(format!("Category must be one of: {}", names.join(", ")))
    })
}
