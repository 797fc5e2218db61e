use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per rule, keyed by the flattened store key
        manager
            .create_table(
                Table::create()
                    .table(RuleRecords::Table)
                    .if_not_exists()
                    .col(string(RuleRecords::Namespace))
                    .col(string(RuleRecords::Kind))
                    .col(string(RuleRecords::ParentKind))
                    .col(big_integer(RuleRecords::ParentId))
                    .col(string(RuleRecords::Name))
                    .col(string(RuleRecords::Ptype))
                    .col(value_column(RuleRecords::V0))
                    .col(value_column(RuleRecords::V1))
                    .col(value_column(RuleRecords::V2))
                    .col(value_column(RuleRecords::V3))
                    .col(value_column(RuleRecords::V4))
                    .col(value_column(RuleRecords::V5))
                    .primary_key(
                        Index::create()
                            .col(RuleRecords::Namespace)
                            .col(RuleRecords::Kind)
                            .col(RuleRecords::ParentKind)
                            .col(RuleRecords::ParentId)
                            .col(RuleRecords::Name),
                    )
                    .to_owned(),
            )
            .await?;

        // Partition listing and filtered deletes narrow on ptype first
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_rule_records_partition_ptype")
                    .table(RuleRecords::Table)
                    .col(RuleRecords::Namespace)
                    .col(RuleRecords::Kind)
                    .col(RuleRecords::Ptype)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RuleRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn value_column(column: RuleRecords) -> ColumnDef {
    ColumnDef::new(column)
        .string()
        .not_null()
        .default("")
        .to_owned()
}

#[derive(DeriveIden)]
enum RuleRecords {
    Table,
    Namespace,
    Kind,
    ParentKind,
    ParentId,
    Name,
    Ptype,
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
}
