use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use rewired_types::api::{
    CreateCategoryRequest, CreateProductRequest, ProductQuery, UpdateCategoryRequest,
    UpdateProductRequest,
};
use rewired_types::models::{Category, Product, ProductDetail, ProductStatus};

use crate::error::is_constraint_violation;
use crate::models::enum_col;
use crate::{Database, Result, StoreError};

/// Enriched product row: joined category/seller names plus favorite count.
const PRODUCT_SELECT: &str = "SELECT p.id, p.title, p.description, p.price, p.condition, p.brand, p.model,
        p.category_id, p.seller_id, p.quantity, p.location, p.image_url,
        p.status, p.views, p.created_at, p.updated_at,
        c.name, u.username,
        (SELECT COUNT(*) FROM favorites f WHERE f.product_id = p.id)
 FROM products p
 JOIN categories c ON p.category_id = c.id
 JOIN users u ON p.seller_id = u.id";

fn map_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        condition: enum_col(row, 4)?,
        brand: row.get(5)?,
        model: row.get(6)?,
        category_id: row.get(7)?,
        seller_id: row.get(8)?,
        quantity: row.get(9)?,
        location: row.get(10)?,
        image_url: row.get(11)?,
        status: enum_col(row, 12)?,
        views: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        category_name: row.get(16)?,
        seller_name: row.get(17)?,
        favorite_count: row.get(18)?,
    })
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn fetch_product(conn: &Connection, id: i64) -> Result<Product> {
    let sql = format!("{} WHERE p.id = ?1", PRODUCT_SELECT);
    conn.query_row(&sql, [id], map_product)
        .optional()?
        .ok_or_else(|| StoreError::not_found("Product not found"))
}

impl Database {
    // -- Categories --

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, icon, is_active, created_at
                 FROM categories WHERE is_active = 1 ORDER BY name",
            )?;
            let categories = stmt
                .query_map([], map_category)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(categories)
        })
    }

    pub fn get_category(&self, id: i64) -> Result<Category> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, icon, is_active, created_at
                 FROM categories WHERE id = ?1 AND is_active = 1",
                [id],
                map_category,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("Category not found"))
        })
    }

    pub fn create_category(&self, req: &CreateCategoryRequest) -> Result<Category> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (name, description, icon) VALUES (?1, ?2, ?3)",
                params![req.name, req.description, req.icon],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::conflict("Category name already exists")
                } else {
                    e.into()
                }
            })?;

            let id = conn.last_insert_rowid();
            Ok(conn.query_row(
                "SELECT id, name, description, icon, is_active, created_at
                 FROM categories WHERE id = ?1",
                [id],
                map_category,
            )?)
        })
    }

    pub fn update_category(&self, id: i64, req: &UpdateCategoryRequest) -> Result<Category> {
        self.with_conn(|conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();

            if let Some(v) = &req.name {
                sets.push("name = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.description {
                sets.push("description = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.icon {
                sets.push("icon = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = req.is_active {
                sets.push("is_active = ?");
                values.push((v as i64).into());
            }

            if sets.is_empty() {
                return Err(StoreError::invalid("No fields to update"));
            }
            values.push(id.into());

            let sql = format!("UPDATE categories SET {} WHERE id = ?", sets.join(", "));
            let changed = conn
                .execute(&sql, params_from_iter(values.iter()))
                .map_err(|e| {
                    if is_constraint_violation(&e) {
                        StoreError::conflict("Category name already exists")
                    } else {
                        StoreError::from(e)
                    }
                })?;
            if changed == 0 {
                return Err(StoreError::not_found("Category not found"));
            }

            Ok(conn.query_row(
                "SELECT id, name, description, icon, is_active, created_at
                 FROM categories WHERE id = ?1",
                [id],
                map_category,
            )?)
        })
    }

    pub fn delete_category(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE categories SET is_active = 0 WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(StoreError::not_found("Category not found"));
            }
            Ok(())
        })
    }

    pub fn category_products(&self, id: i64, page: u32, limit: u32) -> Result<(Vec<Product>, i64)> {
        self.with_conn(|conn| {
            let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
            let sql = format!(
                "{} WHERE p.category_id = ?1 AND p.status = 'available'
                 ORDER BY p.created_at DESC LIMIT ?2 OFFSET ?3",
                PRODUCT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let products = stmt
                .query_map(params![id, limit, offset], map_product)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM products WHERE category_id = ?1 AND status = 'available'",
                [id],
                |row| row.get(0),
            )?;
            Ok((products, total))
        })
    }

    // -- Products --

    pub fn insert_product(&self, seller_id: i64, req: &CreateProductRequest) -> Result<Product> {
        self.get_category(req.category_id)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (title, description, price, condition, brand, model,
                                       category_id, seller_id, quantity, location, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    req.title,
                    req.description,
                    req.price,
                    req.condition.as_str(),
                    req.brand,
                    req.model,
                    req.category_id,
                    seller_id,
                    req.quantity.unwrap_or(1),
                    req.location,
                    req.image_url,
                ],
            )?;
            fetch_product(conn, conn.last_insert_rowid())
        })
    }

    /// Listing with optional filters. Only available products are returned;
    /// the sort column comes from a typed allow-list, never from raw input.
    pub fn list_products(&self, query: &ProductQuery) -> Result<(Vec<Product>, i64)> {
        self.with_conn(|conn| {
            let mut filters: Vec<&str> = vec!["p.status = 'available'"];
            let mut values: Vec<Value> = Vec::new();

            if let Some(category) = query.category {
                filters.push("p.category_id = ?");
                values.push(category.into());
            }
            if let Some(min) = query.min_price {
                filters.push("p.price >= ?");
                values.push(min.into());
            }
            if let Some(max) = query.max_price {
                filters.push("p.price <= ?");
                values.push(max.into());
            }
            if let Some(condition) = query.condition {
                filters.push("p.condition = ?");
                values.push(condition.as_str().to_string().into());
            }
            if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
                filters.push("(p.title LIKE ? OR p.description LIKE ? OR p.brand LIKE ?)");
                let pattern = format!("%{}%", search);
                values.push(pattern.clone().into());
                values.push(pattern.clone().into());
                values.push(pattern.into());
            }

            let where_clause = filters.join(" AND ");

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM products p WHERE {}", where_clause),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let offset = i64::from(query.page.saturating_sub(1)) * i64::from(query.limit);
            let sql = format!(
                "{} WHERE {} ORDER BY p.{} {} LIMIT ? OFFSET ?",
                PRODUCT_SELECT,
                where_clause,
                query.sort_by.column(),
                query.order.keyword()
            );
            values.push(i64::from(query.limit).into());
            values.push(offset.into());

            let mut stmt = conn.prepare(&sql)?;
            let products = stmt
                .query_map(params_from_iter(values.iter()), map_product)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok((products, total))
        })
    }

    /// Every read bumps the view counter; repeated reads inflate views.
    pub fn product_detail(&self, id: i64) -> Result<ProductDetail> {
        self.with_conn(|conn| {
            conn.execute("UPDATE products SET views = views + 1 WHERE id = ?1", [id])?;

            let sql = "SELECT p.id, p.title, p.description, p.price, p.condition, p.brand, p.model,
                        p.category_id, p.seller_id, p.quantity, p.location, p.image_url,
                        p.status, p.views, p.created_at, p.updated_at,
                        c.name, u.username,
                        (SELECT COUNT(*) FROM favorites f WHERE f.product_id = p.id),
                        u.email, u.phone, u.created_at,
                        (SELECT COUNT(*) FROM products
                          WHERE seller_id = p.seller_id AND status = 'available')
                 FROM products p
                 JOIN categories c ON p.category_id = c.id
                 JOIN users u ON p.seller_id = u.id
                 WHERE p.id = ?1";

            conn.query_row(sql, [id], |row| {
                Ok(ProductDetail {
                    product: map_product(row)?,
                    seller_email: row.get(19)?,
                    seller_phone: row.get(20)?,
                    seller_since: row.get(21)?,
                    seller_total_products: row.get(22)?,
                })
            })
            .optional()?
            .ok_or_else(|| StoreError::not_found("Product not found"))
        })
    }

    /// Updates only the fields present in the request; the mutable-column
    /// allow-list is the request struct itself. Seller-only.
    pub fn update_product(
        &self,
        id: i64,
        user_id: i64,
        req: &UpdateProductRequest,
    ) -> Result<Product> {
        if req.is_empty() {
            return Err(StoreError::invalid("No fields to update"));
        }
        if let Some(category_id) = req.category_id {
            self.get_category(category_id)?;
        }

        self.with_conn(|conn| {
            let seller_id: i64 = conn
                .query_row("SELECT seller_id FROM products WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| StoreError::not_found("Product not found"))?;

            if seller_id != user_id {
                return Err(StoreError::forbidden(
                    "You can only update your own products",
                ));
            }

            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();

            if let Some(v) = &req.title {
                sets.push("title = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.description {
                sets.push("description = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = req.price {
                sets.push("price = ?");
                values.push(v.into());
            }
            if let Some(v) = req.condition {
                sets.push("condition = ?");
                values.push(v.as_str().to_string().into());
            }
            if let Some(v) = &req.brand {
                sets.push("brand = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.model {
                sets.push("model = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = req.category_id {
                sets.push("category_id = ?");
                values.push(v.into());
            }
            if let Some(v) = req.quantity {
                sets.push("quantity = ?");
                values.push(v.into());
            }
            if let Some(v) = &req.location {
                sets.push("location = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.image_url {
                sets.push("image_url = ?");
                values.push(v.clone().into());
            }

            sets.push("updated_at = datetime('now')");
            values.push(id.into());

            let sql = format!("UPDATE products SET {} WHERE id = ?", sets.join(", "));
            conn.execute(&sql, params_from_iter(values.iter()))?;

            fetch_product(conn, id)
        })
    }

    /// Soft delete; allowed for the owning seller or an admin.
    pub fn soft_delete_product(&self, id: i64, user_id: i64, is_admin: bool) -> Result<()> {
        self.with_conn(|conn| {
            let seller_id: i64 = conn
                .query_row("SELECT seller_id FROM products WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| StoreError::not_found("Product not found"))?;

            if seller_id != user_id && !is_admin {
                return Err(StoreError::forbidden(
                    "You can only delete your own products",
                ));
            }

            conn.execute(
                "UPDATE products SET status = 'deleted', updated_at = datetime('now')
                 WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn seller_products(&self, seller_id: i64, status: ProductStatus) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE p.seller_id = ?1 AND p.status = ?2 ORDER BY p.created_at DESC",
                PRODUCT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let products = stmt
                .query_map(params![seller_id, status.as_str()], map_product)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(products)
        })
    }

    // -- Favorites --

    /// Idempotent flip: inserts if absent, deletes if present. Returns the
    /// resulting state.
    pub fn toggle_favorite(&self, user_id: i64, product_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM products WHERE id = ?1",
                    [product_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::not_found("Product not found"));
            }

            let favorite: Option<i64> = conn
                .query_row(
                    "SELECT id FROM favorites WHERE user_id = ?1 AND product_id = ?2",
                    params![user_id, product_id],
                    |row| row.get(0),
                )
                .optional()?;

            match favorite {
                Some(fav_id) => {
                    conn.execute("DELETE FROM favorites WHERE id = ?1", [fav_id])?;
                    Ok(false)
                }
                None => {
                    conn.execute(
                        "INSERT INTO favorites (user_id, product_id) VALUES (?1, ?2)",
                        params![user_id, product_id],
                    )?;
                    Ok(true)
                }
            }
        })
    }

    /// Favorited products that are still available, newest favorite first.
    pub fn favorites_for(&self, user_id: i64) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let sql = "SELECT p.id, p.title, p.description, p.price, p.condition, p.brand, p.model,
                        p.category_id, p.seller_id, p.quantity, p.location, p.image_url,
                        p.status, p.views, p.created_at, p.updated_at,
                        c.name, u.username,
                        (SELECT COUNT(*) FROM favorites f2 WHERE f2.product_id = p.id)
                 FROM favorites f
                 JOIN products p ON f.product_id = p.id
                 JOIN categories c ON p.category_id = c.id
                 JOIN users u ON p.seller_id = u.id
                 WHERE f.user_id = ?1 AND p.status = 'available'
                 ORDER BY f.created_at DESC";
            let mut stmt = conn.prepare(sql)?;
            let products = stmt
                .query_map([user_id], map_product)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(products)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{first_category, list_product, register};
    use rewired_types::api::{ProductSort, SortOrder};
    use rewired_types::models::Condition;

    fn query() -> ProductQuery {
        ProductQuery {
            page: 1,
            limit: 20,
            ..Default::default()
        }
    }

    #[test]
    fn seeded_categories_are_present() {
        let db = Database::open_in_memory().unwrap();
        let categories = db.list_categories().unwrap();
        assert_eq!(categories.len(), 10);
        assert!(categories.iter().any(|c| c.name == "Smartphones"));
    }

    #[test]
    fn category_soft_delete_hides_it() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_category(&CreateCategoryRequest {
                name: "Drones".into(),
                description: None,
                icon: None,
            })
            .unwrap()
            .id;

        db.delete_category(id).unwrap();
        assert!(matches!(
            db.get_category(id).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn duplicate_category_name_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_category(&CreateCategoryRequest {
                name: "Laptops".into(),
                description: None,
                icon: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn listing_filters_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        for i in 0..3 {
            list_product(&db, seller, 50.0 + f64::from(i) * 100.0, 1);
        }

        let (all, total) = db.list_products(&query()).unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let (cheap, total) = db
            .list_products(&ProductQuery {
                max_price: Some(100.0),
                ..query()
            })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(cheap[0].price, 50.0);

        let (sorted, _) = db
            .list_products(&ProductQuery {
                sort_by: ProductSort::Price,
                order: SortOrder::Asc,
                ..query()
            })
            .unwrap();
        assert!(sorted.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn listing_page_size_respects_limit() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        for _ in 0..5 {
            list_product(&db, seller, 10.0, 1);
        }

        let (page, total) = db
            .list_products(&ProductQuery {
                limit: 2,
                ..query()
            })
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (last, _) = db
            .list_products(&ProductQuery {
                page: 3,
                limit: 2,
                ..query()
            })
            .unwrap();
        assert_eq!(last.len(), 1);
    }

    #[test]
    fn search_matches_title_description_brand() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        list_product(&db, seller, 10.0, 1); // brand "Acme"

        let (hits, _) = db
            .list_products(&ProductQuery {
                search: Some("acm".into()),
                ..query()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);

        let (misses, _) = db
            .list_products(&ProductQuery {
                search: Some("zebra".into()),
                ..query()
            })
            .unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn detail_read_increments_views() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        let id = list_product(&db, seller, 10.0, 1);

        let first = db.product_detail(id).unwrap();
        let second = db.product_detail(id).unwrap();
        assert_eq!(first.product.views, 1);
        assert_eq!(second.product.views, 2);
        assert_eq!(second.seller_total_products, 1);
    }

    #[test]
    fn update_is_seller_only_and_partial() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        let other = register(&db, "other", "other@example.com");
        let id = list_product(&db, seller, 10.0, 1);

        let err = db
            .update_product(
                id,
                other,
                &UpdateProductRequest {
                    price: Some(1.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let updated = db
            .update_product(
                id,
                seller,
                &UpdateProductRequest {
                    price: Some(25.0),
                    condition: Some(Condition::Fair),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.price, 25.0);
        assert_eq!(updated.condition, Condition::Fair);
        assert_eq!(updated.title, "Refurbished handset");

        let err = db
            .update_product(id, seller, &UpdateProductRequest::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn delete_is_owner_or_admin() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        let admin = register(&db, "admin", "admin@example.com");
        let id = list_product(&db, seller, 10.0, 1);

        let err = db.soft_delete_product(id, admin, false).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        db.soft_delete_product(id, admin, true).unwrap();
        let (listed, _) = db.list_products(&query()).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn seller_products_filter_by_status() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        let keep = list_product(&db, seller, 10.0, 1);
        let gone = list_product(&db, seller, 20.0, 1);
        db.soft_delete_product(gone, seller, false).unwrap();

        let available = db
            .seller_products(seller, ProductStatus::Available)
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, keep);

        let deleted = db.seller_products(seller, ProductStatus::Deleted).unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, gone);
    }

    #[test]
    fn favorite_toggle_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        let buyer = register(&db, "buyer", "buyer@example.com");
        let id = list_product(&db, seller, 10.0, 1);

        assert!(db.toggle_favorite(buyer, id).unwrap());
        assert_eq!(db.favorites_for(buyer).unwrap().len(), 1);

        assert!(!db.toggle_favorite(buyer, id).unwrap());
        assert!(db.favorites_for(buyer).unwrap().is_empty());
    }

    #[test]
    fn insert_requires_known_category() {
        let db = Database::open_in_memory().unwrap();
        let seller = register(&db, "seller", "seller@example.com");
        let _ = first_category(&db);

        let err = db
            .insert_product(
                seller,
                &CreateProductRequest {
                    title: "Ghost".into(),
                    description: "No category".into(),
                    price: 1.0,
                    condition: Condition::Poor,
                    brand: None,
                    model: None,
                    category_id: 9999,
                    quantity: None,
                    location: None,
                    image_url: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
