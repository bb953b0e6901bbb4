//! Homepage hero carousel

use crate::cache::{keys, SharedCache};
use crate::db::repositories::HeroImageRepository;
use crate::models::{DisplayOrder, HeroImage, HeroImageInput};
use crate::services::validate;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum HeroImageServiceError {
    #[error("Hero image not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct HeroImageService {
    repo: Arc<dyn HeroImageRepository>,
    cache: SharedCache,
}

impl HeroImageService {
    pub fn new(repo: Arc<dyn HeroImageRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Active images in display order
    pub async fn list_active(&self) -> Result<Vec<HeroImage>, HeroImageServiceError> {
        if let Some(cached) = self.cache.get(keys::HERO_IMAGES_ACTIVE).await {
            return Ok(cached);
        }
        let images = self
            .repo
            .list(false)
            .await
            .context("Failed to list hero images")?;
        self.cache.set(keys::HERO_IMAGES_ACTIVE, &images).await;
        Ok(images)
    }

    pub async fn list_all(&self) -> Result<Vec<HeroImage>, HeroImageServiceError> {
        Ok(self
            .repo
            .list(true)
            .await
            .context("Failed to list hero images")?)
    }

    /// New images go after the last one unless an order is given
    pub async fn create(&self, input: HeroImageInput) -> Result<HeroImage, HeroImageServiceError> {
        let input = clean(input)?;
        let order = match input.display_order {
            Some(order) => order,
            None => self
                .repo
                .max_display_order()
                .await
                .context("Failed to read display order")?
                .map_or(0, |max| max + 1),
        };

        let image = self
            .repo
            .create(&input, order)
            .await
            .context("Failed to create hero image")?;
        self.cache.invalidate_prefix(keys::HERO_IMAGES).await;
        Ok(image)
    }

    pub async fn update(
        &self,
        id: i64,
        input: HeroImageInput,
    ) -> Result<HeroImage, HeroImageServiceError> {
        let input = clean(input)?;
        let current = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load hero image")?
            .ok_or(HeroImageServiceError::NotFound)?;
        let order = input.display_order.unwrap_or(current.display_order);

        let image = self
            .repo
            .update(id, &input, order)
            .await
            .context("Failed to update hero image")?
            .ok_or(HeroImageServiceError::NotFound)?;
        self.cache.invalidate_prefix(keys::HERO_IMAGES).await;
        Ok(image)
    }

    /// Flip `is_active`
    pub async fn toggle(&self, id: i64) -> Result<HeroImage, HeroImageServiceError> {
        let image = self
            .repo
            .toggle_active(id)
            .await
            .context("Failed to toggle hero image")?
            .ok_or(HeroImageServiceError::NotFound)?;
        self.cache.invalidate_prefix(keys::HERO_IMAGES).await;
        Ok(image)
    }

    pub async fn reorder(
        &self,
        orders: Vec<DisplayOrder>,
    ) -> Result<Vec<HeroImage>, HeroImageServiceError> {
        if orders.is_empty() {
            return Err(HeroImageServiceError::ValidationError(
                "No images to reorder".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if !orders.iter().all(|o| seen.insert(o.id)) {
            return Err(HeroImageServiceError::ValidationError(
                "Each image may appear only once".to_string(),
            ));
        }

        let applied = self
            .repo
            .reorder(&orders)
            .await
            .context("Failed to reorder hero images")?;
        if !applied {
            return Err(HeroImageServiceError::NotFound);
        }
        self.cache.invalidate_prefix(keys::HERO_IMAGES).await;
        self.list_all().await
    }

    pub async fn delete(&self, id: i64) -> Result<(), HeroImageServiceError> {
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete hero image")?
        {
            return Err(HeroImageServiceError::NotFound);
        }
        self.cache.invalidate_prefix(keys::HERO_IMAGES).await;
        Ok(())
    }
}

fn clean(input: HeroImageInput) -> Result<HeroImageInput, HeroImageServiceError> {
    Ok(HeroImageInput {
        title: validate::required(&input.title, "Title")
            .map_err(HeroImageServiceError::ValidationError)?,
        subtitle: validate::optional(input.subtitle),
        image_url: validate::required(&input.image_url, "Image URL")
            .map_err(HeroImageServiceError::ValidationError)?,
        link_url: validate::optional(input.link_url),
        display_order: input.display_order,
        is_active: input.is_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxHeroImageRepository;
    use crate::db::{create_test_pool, migrations};
    use std::time::Duration;

    async fn setup() -> HeroImageService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        HeroImageService::new(
            SqlxHeroImageRepository::boxed(pool),
            Arc::new(MemoryCache::new(100, Duration::from_secs(60))),
        )
    }

    fn input(title: &str) -> HeroImageInput {
        HeroImageInput {
            title: title.to_string(),
            subtitle: None,
            image_url: format!("/uploads/{}.jpg", title),
            link_url: None,
            display_order: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let service = setup().await;
        let image = service.create(input("welcome")).await.unwrap();
        assert!(image.is_active);

        let once = service.toggle(image.id).await.unwrap();
        assert!(!once.is_active);
        assert!(service.list_active().await.unwrap().is_empty());

        let twice = service.toggle(image.id).await.unwrap();
        assert_eq!(twice.is_active, image.is_active);
        assert_eq!(twice.title, image.title);
        assert_eq!(twice.display_order, image.display_order);
        assert_eq!(service.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_appends_order() {
        let service = setup().await;
        let first = service.create(input("a")).await.unwrap();
        let second = service.create(input("b")).await.unwrap();
        assert_eq!(first.display_order, 0);
        assert_eq!(second.display_order, 1);
    }

    #[tokio::test]
    async fn test_reorder() {
        let service = setup().await;
        let a = service.create(input("a")).await.unwrap();
        let b = service.create(input("b")).await.unwrap();
        assert_eq!(service.list_active().await.unwrap()[0].id, a.id);

        let images = service
            .reorder(vec![
                DisplayOrder { id: a.id, display_order: 5 },
                DisplayOrder { id: b.id, display_order: 1 },
            ])
            .await
            .unwrap();
        assert_eq!(images[0].id, b.id);
        assert_eq!(service.list_active().await.unwrap()[0].id, b.id);

        let duplicate = vec![
            DisplayOrder { id: a.id, display_order: 1 },
            DisplayOrder { id: a.id, display_order: 2 },
        ];
        assert!(matches!(
            service.reorder(duplicate).await,
            Err(HeroImageServiceError::ValidationError(_))
        ));

        let unknown = vec![
            DisplayOrder { id: a.id, display_order: 0 },
            DisplayOrder { id: 999, display_order: 1 },
        ];
        assert!(matches!(
            service.reorder(unknown).await,
            Err(HeroImageServiceError::NotFound)
        ));
        assert_eq!(service.list_active().await.unwrap()[0].id, b.id);
    }

    #[tokio::test]
    async fn test_update_keeps_order_and_delete() {
        let service = setup().await;
        service.create(input("a")).await.unwrap();
        let b = service.create(input("b")).await.unwrap();

        let updated = service.update(b.id, input("renamed")).await.unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.display_order, 1);

        service.delete(b.id).await.unwrap();
        assert!(matches!(
            service.delete(b.id).await,
            Err(HeroImageServiceError::NotFound)
        ));
        assert!(matches!(
            service.toggle(b.id).await,
            Err(HeroImageServiceError::NotFound)
        ));
    }
}
