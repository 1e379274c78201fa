//! Splits merchant category memory into income and expense slots.
//!
//! The legacy `category_id` column stays as the sign-agnostic fallback; the
//! backfill copies it into the slot matching the category's kind so existing
//! merchants keep resolving the way they did before the split.

use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Merchants {
    Table,
    Id,
    UserId,
    Name,
    AliasId,
    CategoryId,
    IncomeCategoryId,
    ExpenseCategoryId,
}

#[derive(Iden)]
enum MerchantsNew {
    Table,
}

#[derive(Iden)]
enum MerchantAliases {
    Table,
    Id,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = db.get_database_backend();

        if backend == DbBackend::Sqlite {
            db.execute(Statement::from_string(
                backend,
                "PRAGMA foreign_keys=OFF;".to_string(),
            ))
            .await?;
        }

        // SQLite cannot add foreign-keyed columns in place; build the new
        // table beside the old one, copy, then swap names.
        manager
            .create_table(
                Table::create()
                    .table(MerchantsNew::Table)
                    .col(
                        ColumnDef::new(Merchants::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Merchants::UserId).string().not_null())
                    .col(ColumnDef::new(Merchants::Name).string().not_null())
                    .col(ColumnDef::new(Merchants::AliasId).uuid().not_null())
                    .col(ColumnDef::new(Merchants::CategoryId).uuid())
                    .col(ColumnDef::new(Merchants::IncomeCategoryId).uuid())
                    .col(ColumnDef::new(Merchants::ExpenseCategoryId).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchants-alias_id")
                            .from(MerchantsNew::Table, Merchants::AliasId)
                            .to(MerchantAliases::Table, MerchantAliases::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchants-category_id")
                            .from(MerchantsNew::Table, Merchants::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchants-income_category_id")
                            .from(MerchantsNew::Table, Merchants::IncomeCategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchants-expense_category_id")
                            .from(MerchantsNew::Table, Merchants::ExpenseCategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        db.execute(Statement::from_string(
            backend,
            "INSERT INTO merchants_new \
                (id, user_id, name, alias_id, category_id, income_category_id, expense_category_id) \
             SELECT m.id, m.user_id, m.name, m.alias_id, m.category_id, \
                CASE WHEN c.kind = 'income' THEN m.category_id END, \
                CASE WHEN c.kind = 'expense' THEN m.category_id END \
             FROM merchants m \
             LEFT JOIN categories c ON c.id = m.category_id;"
                .to_string(),
        ))
        .await?;

        manager
            .drop_table(Table::drop().table(Merchants::Table).to_owned())
            .await?;

        db.execute(Statement::from_string(
            backend,
            "ALTER TABLE merchants_new RENAME TO merchants;".to_string(),
        ))
        .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-merchants-user_id-name-unique")
                    .table(Merchants::Table)
                    .col(Merchants::UserId)
                    .col(Merchants::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-merchants-alias_id")
                    .table(Merchants::Table)
                    .col(Merchants::AliasId)
                    .to_owned(),
            )
            .await?;

        if backend == DbBackend::Sqlite {
            db.execute(Statement::from_string(
                backend,
                "PRAGMA foreign_keys=ON;".to_string(),
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Err(DbErr::Custom(
            "m20260315_000000_split_merchant_categories is irreversible".to_string(),
        ))
    }
}
