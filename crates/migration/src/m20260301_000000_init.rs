use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Banks {
    Table,
    Id,
    Name,
    Slug,
    ConnectorId,
    LogoUrl,
    ColorHex,
    IsActive,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    Slug,
    ColorHex,
    ParentId,
    ExternalId,
    Kind,
    IsInvestment,
    Ignored,
}

#[derive(Iden)]
enum UserCategorySettings {
    Table,
    UserId,
    CategoryId,
    ColorHex,
    AliasLabel,
    IsInvestment,
    Ignored,
}

#[derive(Iden)]
enum MerchantAliases {
    Table,
    Id,
    UserId,
    Pattern,
    CategoryId,
    IsInvestment,
    Ignored,
    UpdatePastTransactions,
}

#[derive(Iden)]
enum Merchants {
    Table,
    Id,
    UserId,
    Name,
    AliasId,
    CategoryId,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    MerchantId,
    BankId,
    Date,
    Title,
    Description,
    AmountMinor,
    Kind,
    Method,
    CategoryId,
    ExternalId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Banks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Banks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Banks::Name).string().not_null())
                    .col(ColumnDef::new(Banks::Slug).string().not_null())
                    .col(ColumnDef::new(Banks::ConnectorId).big_integer())
                    .col(ColumnDef::new(Banks::LogoUrl).string())
                    .col(ColumnDef::new(Banks::ColorHex).string())
                    .col(ColumnDef::new(Banks::IsActive).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-banks-slug-unique")
                    .table(Banks::Table)
                    .col(Banks::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-banks-connector_id-unique")
                    .table(Banks::Table)
                    .col(Banks::ConnectorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::Slug).string().not_null())
                    .col(ColumnDef::new(Categories::ColorHex).string().not_null())
                    .col(ColumnDef::new(Categories::ParentId).uuid())
                    .col(ColumnDef::new(Categories::ExternalId).string())
                    .col(ColumnDef::new(Categories::Kind).string().not_null())
                    .col(ColumnDef::new(Categories::IsInvestment).boolean().not_null())
                    .col(ColumnDef::new(Categories::Ignored).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-parent_id")
                            .from(Categories::Table, Categories::ParentId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-slug-unique")
                    .table(Categories::Table)
                    .col(Categories::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-external_id-unique")
                    .table(Categories::Table)
                    .col(Categories::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-parent_id")
                    .table(Categories::Table)
                    .col(Categories::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserCategorySettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserCategorySettings::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserCategorySettings::CategoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserCategorySettings::ColorHex).string())
                    .col(ColumnDef::new(UserCategorySettings::AliasLabel).string())
                    .col(ColumnDef::new(UserCategorySettings::IsInvestment).boolean())
                    .col(ColumnDef::new(UserCategorySettings::Ignored).boolean())
                    .primary_key(
                        Index::create()
                            .col(UserCategorySettings::UserId)
                            .col(UserCategorySettings::CategoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_category_settings-category_id")
                            .from(
                                UserCategorySettings::Table,
                                UserCategorySettings::CategoryId,
                            )
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MerchantAliases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MerchantAliases::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MerchantAliases::UserId).string().not_null())
                    .col(ColumnDef::new(MerchantAliases::Pattern).string().not_null())
                    .col(ColumnDef::new(MerchantAliases::CategoryId).uuid())
                    .col(
                        ColumnDef::new(MerchantAliases::IsInvestment)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MerchantAliases::Ignored).boolean().not_null())
                    .col(
                        ColumnDef::new(MerchantAliases::UpdatePastTransactions)
                            .boolean()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchant_aliases-category_id")
                            .from(MerchantAliases::Table, MerchantAliases::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-merchant_aliases-user_id-pattern-unique")
                    .table(MerchantAliases::Table)
                    .col(MerchantAliases::UserId)
                    .col(MerchantAliases::Pattern)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Merchants::Table)
                    .if_not_exists()
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
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchants-alias_id")
                            .from(Merchants::Table, Merchants::AliasId)
                            .to(MerchantAliases::Table, MerchantAliases::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-merchants-category_id")
                            .from(Merchants::Table, Merchants::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
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

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::MerchantId).uuid())
                    .col(ColumnDef::new(Transactions::BankId).uuid())
                    .col(ColumnDef::new(Transactions::Date).date().not_null())
                    .col(ColumnDef::new(Transactions::Title).string().not_null())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Method).string().not_null())
                    .col(ColumnDef::new(Transactions::CategoryId).uuid().not_null())
                    .col(ColumnDef::new(Transactions::ExternalId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-merchant_id")
                            .from(Transactions::Table, Transactions::MerchantId)
                            .to(Merchants::Table, Merchants::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-bank_id")
                            .from(Transactions::Table, Transactions::BankId)
                            .to(Banks::Table, Banks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-date")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-external_id-unique")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-merchant_id")
                    .table(Transactions::Table)
                    .col(Transactions::MerchantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Merchants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MerchantAliases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserCategorySettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Banks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
