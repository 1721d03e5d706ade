use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub cart_items: Json,
    pub shipping_address: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub customer_details: Json,
    pub total_amount: i64,
    pub currency: String,
    #[sea_orm(unique)]
    pub transaction_ref: String,
    pub payment_method: String,
    pub payment_status: String,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::order_suppliers::Entity")]
    OrderSuppliers,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_suppliers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderSuppliers.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
