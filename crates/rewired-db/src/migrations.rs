use crate::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            full_name       TEXT NOT NULL,
            phone           TEXT,
            address         TEXT,
            city            TEXT,
            state           TEXT,
            zip_code        TEXT,
            role            TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
            is_active       INTEGER NOT NULL DEFAULT 1,
            email_verified  INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS categories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            icon        TEXT,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            price       REAL NOT NULL,
            condition   TEXT NOT NULL
                        CHECK (condition IN ('new', 'like-new', 'good', 'fair', 'poor')),
            brand       TEXT,
            model       TEXT,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            seller_id   INTEGER NOT NULL REFERENCES users(id),
            quantity    INTEGER NOT NULL DEFAULT 1,
            location    TEXT,
            image_url   TEXT,
            status      TEXT NOT NULL DEFAULT 'available'
                        CHECK (status IN ('available', 'sold', 'pending', 'deleted')),
            views       INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_products_category
            ON products(category_id, status);
        CREATE INDEX IF NOT EXISTS idx_products_seller
            ON products(seller_id, status);

        CREATE TABLE IF NOT EXISTS transactions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id       INTEGER NOT NULL REFERENCES products(id),
            buyer_id         INTEGER NOT NULL REFERENCES users(id),
            seller_id        INTEGER NOT NULL REFERENCES users(id),
            quantity         INTEGER NOT NULL DEFAULT 1,
            total_price      REAL NOT NULL,
            status           TEXT NOT NULL DEFAULT 'pending'
                             CHECK (status IN ('pending', 'completed', 'cancelled', 'refunded')),
            payment_method   TEXT,
            shipping_address TEXT,
            tracking_number  TEXT,
            notes            TEXT,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            completed_at     TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_buyer
            ON transactions(buyer_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_transactions_seller
            ON transactions(seller_id, created_at);

        CREATE TABLE IF NOT EXISTS favorites (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            product_id  INTEGER NOT NULL REFERENCES products(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, product_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            receiver_id INTEGER NOT NULL REFERENCES users(id),
            product_id  INTEGER REFERENCES products(id),
            subject     TEXT,
            body        TEXT NOT NULL,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, created_at);

        -- Seed the default category set
        INSERT OR IGNORE INTO categories (name, description, icon) VALUES
            ('Smartphones', 'Mobile phones and accessories', 'smartphone'),
            ('Laptops', 'Laptops and notebooks', 'laptop'),
            ('Tablets', 'Tablets and e-readers', 'tablet'),
            ('Cameras', 'Digital cameras and accessories', 'camera'),
            ('Audio', 'Headphones, speakers, and audio equipment', 'headphones'),
            ('Gaming', 'Gaming consoles and accessories', 'gamepad'),
            ('Wearables', 'Smartwatches and fitness trackers', 'watch'),
            ('Accessories', 'Cables, chargers, and other accessories', 'cable'),
            ('Components', 'Computer components and parts', 'cpu'),
            ('Other', 'Other electronics', 'device');
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
