use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::article::{ArticleInput, TagsInput};
use crate::database::ArticleStore;
use crate::error::{AppError, AppResult};
use crate::{generate_object_id, AppState};

struct Sample {
    title: &'static str,
    slug: &'static str,
    content: &'static str,
    excerpt: &'static str,
    image: &'static str,
    category: &'static str,
    author: &'static str,
    tags: &'static str,
    featured: bool,
}

const SAMPLES: &[Sample] = &[
    Sample {
        title: "The Future of AI in Journalism",
        slug: "future-of-ai-journalism",
        content: "Artificial Intelligence is revolutionizing how news is gathered, written, and distributed...",
        excerpt: "How AI is changing the landscape of modern journalism",
        image: "https://source.unsplash.com/random/800x600/?ai",
        category: "Technology",
        author: "John Doe",
        tags: "AI,journalism,technology",
        featured: true,
    },
    Sample {
        title: "Global Climate Summit 2024",
        slug: "global-climate-summit-2024",
        content: "World leaders gather to discuss urgent measures against climate change...",
        excerpt: "Key decisions from the latest climate summit",
        image: "https://source.unsplash.com/random/800x600/?climate",
        category: "World",
        author: "Jane Smith",
        tags: "climate,politics,environment",
        featured: true,
    },
    Sample {
        title: "New Breakthrough in Quantum Computing",
        slug: "quantum-computing-breakthrough",
        content: "Scientists achieve major milestone in quantum computing development...",
        excerpt: "Latest advances in quantum computing research",
        image: "https://source.unsplash.com/random/800x600/?quantum",
        category: "Science",
        author: "Dr. Robert Chen",
        tags: "quantum,science,technology",
        featured: false,
    },
];

/// Inserts the sample articles whose slugs are not taken yet. Returns how many were added.
pub async fn seed_articles(store: &dyn ArticleStore) -> AppResult<usize> {
    let now = Utc::now();
    let mut inserted = 0;

    for (i, sample) in SAMPLES.iter().enumerate() {
        if store.get(sample.slug).await?.is_some() {
            tracing::debug!(slug = sample.slug, "sample already present");
            continue;
        }
        let input = ArticleInput {
            title: Some(sample.title.to_string()),
            slug: Some(sample.slug.to_string()),
            content: Some(sample.content.to_string()),
            excerpt: Some(sample.excerpt.to_string()),
            image: Some(sample.image.to_string()),
            category: Some(sample.category.to_string()),
            author: Some(sample.author.to_string()),
            tags: Some(TagsInput::Delimited(sample.tags.to_string())),
            featured: Some(sample.featured),
        };
        // stagger publish times so listing order is stable
        let published_at = now - Duration::minutes(i as i64);
        let article = input.into_article(generate_object_id(), published_at)?;
        match store.insert(article).await {
            Ok(_) => inserted += 1,
            Err(AppError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    tracing::info!("seeded {} sample articles", inserted);
    Ok(inserted)
}

pub async fn seed_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let count = seed_articles(state.store.as_ref()).await?;
    if count > 0 {
        state.revalidator.article_changed(&[]);
    }
    Ok(Json(json!({ "success": true, "count": count })))
}
